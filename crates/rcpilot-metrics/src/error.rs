//! Metrics error types.

use std::fmt;

use rcpilot_cluster::ClusterError;
use thiserror::Error;

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors that prevent a snapshot from being produced at all.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

/// One sampling target that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// Index of the pod in the snapshot.
    pub pod_index: usize,
    /// Index of the container in that pod's series, when the failure is
    /// container-scoped.
    pub container_index: Option<usize>,
    pub pod: String,
    pub container: Option<String>,
    pub reason: String,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.container, self.container_index) {
            (Some(container), Some(idx)) => write!(
                f,
                "pod[{}] {} container[{}] {}: {}",
                self.pod_index, self.pod, idx, container, self.reason
            ),
            _ => write!(f, "pod[{}] {}: {}", self.pod_index, self.pod, self.reason),
        }
    }
}

/// Aggregated error for the targets of one snapshot that could not be
/// sampled. The snapshot itself is still returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} of {total} sampling targets failed: {}", .failures.len(), render(.failures))]
pub struct PartialFailure {
    pub total: usize,
    pub failures: Vec<TargetFailure>,
}

impl PartialFailure {
    /// Indices of pods with at least one failed target.
    pub fn pod_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.failures.iter().map(|f| f.pod_index).collect();
        indices.dedup();
        indices
    }
}

fn render(failures: &[TargetFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
