//! Autoscale error types.

use rcpilot_cluster::ClusterError;
use rcpilot_core::PolicyError;
use rcpilot_metrics::MetricsError;
use thiserror::Error;

pub type ScaleResult<T> = Result<T, ScaleError>;

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("invalid scale bounds: min {min} > max {max}")]
    InvalidBounds { min: u32, max: u32 },

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
}
