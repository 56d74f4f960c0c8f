//! Rollout error types.

use rcpilot_autoscale::ScaleError;
use rcpilot_cluster::ClusterError;
use thiserror::Error;

pub type RolloutResult<T> = Result<T, RolloutError>;

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("invalid rollout request: {0}")]
    InvalidRequest(String),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("scaling error: {0}")]
    Scale(#[from] ScaleError),

    #[error("group {group} reported size {size} outside [0, {desired}]")]
    InvariantViolation {
        group: String,
        size: u32,
        desired: u32,
    },
}
