use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Empty service name")]
    EmptyServiceName,

    #[error("Service has no instances: {0}")]
    NoInstances(String),

    #[error("Route targets unknown service: {0}")]
    UnknownTarget(String),

    #[error("Route with a rewrite must also have a path_prefix match")]
    RewriteWithoutPrefix,
}

/// Reverse proxy configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for operational endpoints
    pub admin_listener: Listener,
    /// Maps logical service names to instance base URLs
    pub services: IndexMap<String, Vec<Url>>,
    /// Ordered route table; the first matching rule wins. Fixed at process
    /// start, no runtime mutation.
    pub routes: Vec<Route>,
    /// Timeout for one forwarded call, connect through response headers,
    /// in seconds. The response body streams back unbounded.
    #[serde(default = "default_downstream_timeout_secs")]
    pub downstream_timeout_secs: u64,
}

fn default_downstream_timeout_secs() -> u64 {
    10
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Routing rule: match predicate, target logical service, optional rewrite
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Route {
    /// Conditions for matching incoming requests
    pub r#match: Match,
    /// Logical service name to forward to
    pub target: String,
    /// Replacement prefix: the matched path_prefix is stripped and this
    /// prefix substituted before forwarding
    #[serde(default)]
    pub rewrite: Option<String>,
}

/// Request matching criteria; absent fields match anything
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Match {
    /// Hostname to match, compared case-insensitively with any port stripped
    #[serde(default)]
    pub host: Option<String>,
    /// Path prefix to match (case-sensitive)
    #[serde(default)]
    pub path_prefix: Option<String>,
}

impl Config {
    /// Validates the proxy configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        for (name, instances) in &self.services {
            if name.is_empty() {
                return Err(ValidationError::EmptyServiceName);
            }
            if instances.is_empty() {
                return Err(ValidationError::NoInstances(name.clone()));
            }
        }

        for route in &self.routes {
            if !self.services.contains_key(&route.target) {
                return Err(ValidationError::UnknownTarget(route.target.clone()));
            }
            if route.rewrite.is_some() && route.r#match.path_prefix.is_none() {
                return Err(ValidationError::RewriteWithoutPrefix);
            }
        }

        Ok(())
    }
}
