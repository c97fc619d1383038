//! Backend resolution: logical service name to a live network endpoint.
//!
//! The resolver is consulted fresh for every downstream call -- callers never
//! cache endpoints, so health changes take effect between calls. Failing to
//! resolve happens before any network attempt and is a distinct outcome from
//! a resolved-but-unreachable endpoint.

mod fixed;

pub use fixed::FixedResolver;

use async_trait::async_trait;
use shared::correlation::RequestContext;
use url::Url;

/// A resolved backend instance, valid for one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendEndpoint {
    /// Logical service name the endpoint was resolved for.
    pub service: String,
    /// Base URL of the chosen instance.
    pub url: Url,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("no healthy instance for service: {0}")]
    NoHealthyInstance(String),
}

/// Seam between the router/aggregator and the discovery mechanism.
///
/// Constructed once at startup and passed by reference into every consumer;
/// there is no global registry.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(
        &self,
        service: &str,
        ctx: &RequestContext,
    ) -> Result<BackendEndpoint, ResolveError>;
}
