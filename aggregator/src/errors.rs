use serde::Serialize;
use thiserror::Error;

/// Result type alias for aggregator operations
pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;

/// Errors that can escape the aggregation service itself. Per-task downstream
/// failures are not errors at this level; they are folded into the aggregate
/// response as [`FailureKind`] markers.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("failed to serialize response: {0}")]
    ResponseSerialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classes surfaced per task in aggregate responses and logs.
///
/// Resolution and Connectivity describe an unreachable backend; Contract
/// means the backend answered but broke the expected data shape; Internal is
/// a defect in the orchestration itself and is never folded into a degraded
/// payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    #[serde(rename = "ResolutionFailure")]
    Resolution,

    #[serde(rename = "ConnectivityFailure")]
    Connectivity,

    #[serde(rename = "ContractFailure")]
    Contract,

    #[serde(rename = "InternalFailure")]
    Internal,
}

impl FailureKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Resolution => "ResolutionFailure",
            FailureKind::Connectivity => "ConnectivityFailure",
            FailureKind::Contract => "ContractFailure",
            FailureKind::Internal => "InternalFailure",
        }
    }

    /// Whether the failure indicates an unreachable backend. When every task
    /// fails with a connectivity-class kind the whole aggregate reports a
    /// systemic outage instead of a degraded payload.
    pub fn is_connectivity_class(&self) -> bool {
        matches!(self, FailureKind::Resolution | FailureKind::Connectivity)
    }
}
