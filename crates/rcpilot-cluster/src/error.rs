//! Cluster collaborator error types.

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors returned by `ClusterClient` and `MetricSampler` implementations.
///
/// Everything except `NotFound` and `AlreadyExists` is a transient remote
/// failure from the controllers' point of view: it is surfaced to the
/// caller and never retried here.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("api server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("sampling {pod}/{container} failed: {reason}")]
    Sampling {
        pod: String,
        container: String,
        reason: String,
    },
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    pub(crate) fn sampling(pod: &str, container: &str, reason: impl Into<String>) -> Self {
        ClusterError::Sampling {
            pod: pod.to_string(),
            container: container.to_string(),
            reason: reason.into(),
        }
    }
}
