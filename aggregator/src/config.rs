use crate::client::ExpectedShape;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
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

    #[error("Empty task name")]
    EmptyTaskName,

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task {0} references unknown service: {1}")]
    UnknownService(String, String),
}

/// Aggregation service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for operational endpoints
    pub admin_listener: Listener,
    /// Maps logical service names to instance base URLs
    ///
    /// Note: Uses the `url::Url` type for compile-time URL validation.
    /// Invalid URLs are rejected during config deserialization.
    pub services: IndexMap<String, Vec<Url>>,
    /// Ordered task list; aggregate response fields appear in this order
    pub tasks: Vec<TaskConfig>,
    /// Single default timeout applied to every downstream call, in seconds
    #[serde(default = "default_downstream_timeout_secs")]
    pub downstream_timeout_secs: u64,
}

fn default_downstream_timeout_secs() -> u64 {
    10
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
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

/// One declarative aggregation task
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TaskConfig {
    /// Field name in the aggregate response (e.g., "listingCount")
    pub name: String,
    /// Logical service to resolve and call
    pub service: String,
    /// Endpoint path on the backend (e.g., "api/metrics/listing-count")
    pub path: String,
    /// Expected result shape of the backend body
    pub shape: ExpectedShape,
}

impl Config {
    /// Validates the aggregation configuration
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

        let mut task_names = HashSet::new();
        for task in &self.tasks {
            if task.name.is_empty() {
                return Err(ValidationError::EmptyTaskName);
            }
            if !task_names.insert(&task.name) {
                return Err(ValidationError::DuplicateTask(task.name.clone()));
            }
            if !self.services.contains_key(&task.service) {
                return Err(ValidationError::UnknownService(
                    task.name.clone(),
                    task.service.clone(),
                ));
            }
        }

        Ok(())
    }
}
