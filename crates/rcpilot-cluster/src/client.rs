//! Collaborator contracts consumed by the controllers.

use async_trait::async_trait;

use rcpilot_core::{MetricSeries, PodInstance, ReplicaGroup};

use crate::error::ClusterResult;

/// Reads and writes replica groups and lists their pods.
///
/// Implementations are bound to one namespace. None of the methods retry;
/// a failed call is reported to the caller as-is.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a replica group. Missing groups yield `ClusterError::NotFound`.
    async fn get_replica_group(&self, name: &str) -> ClusterResult<ReplicaGroup>;

    /// Create a replica group from `spec` (including its replica count).
    async fn create_replica_group(&self, spec: &ReplicaGroup) -> ClusterResult<()>;

    /// Set the desired replica count and return the count confirmed by the
    /// write response. The confirmed value may differ from `size` when the
    /// group was modified concurrently.
    async fn set_replica_group_size(&self, name: &str, size: u32) -> ClusterResult<u32>;

    async fn delete_replica_group(&self, name: &str) -> ClusterResult<()>;

    /// Live pods belonging to `group`, in a stable order.
    async fn list_pods(&self, group: &str) -> ClusterResult<Vec<PodInstance>>;
}

/// Returns a time-ordered series of resource samples for one container.
#[async_trait]
pub trait MetricSampler: Send + Sync {
    async fn sample_container(
        &self,
        pod: &PodInstance,
        container: &str,
    ) -> ClusterResult<MetricSeries>;
}
