//! `ClusterClient` over the cluster's REST API.
//!
//! Replica groups map to v1 ReplicationControllers; pods are listed per
//! namespace and attributed to a group by generated-name prefix or exact
//! name.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use rcpilot_core::{PodInstance, ReplicaGroup};

use crate::client::ClusterClient;
use crate::error::{ClusterError, ClusterResult};
use crate::transport::HttpTransport;
use crate::wire::{PodList, ReplicationController};

/// HTTP client bound to one API server and namespace.
#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    base_url: String,
    namespace: String,
    transport: HttpTransport,
}

impl HttpClusterClient {
    pub fn new(base_url: &str, namespace: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.to_string(),
            transport: HttpTransport::new(timeout),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn groups_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/replicationcontrollers",
            self.base_url, self.namespace
        )
    }

    fn group_url(&self, name: &str) -> String {
        format!("{}/{}", self.groups_url(), name)
    }

    fn pods_url(&self) -> String {
        format!("{}/api/v1/namespaces/{}/pods", self.base_url, self.namespace)
    }

    fn key(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }

    /// Fetch the raw object, preserving fields rcpilot does not model.
    async fn get_raw(&self, name: &str) -> ClusterResult<ReplicationController> {
        self.transport
            .get(&self.group_url(name))
            .await?
            .json(&self.key(name))
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn get_replica_group(&self, name: &str) -> ClusterResult<ReplicaGroup> {
        ReplicaGroup::try_from(self.get_raw(name).await?)
    }

    async fn create_replica_group(&self, spec: &ReplicaGroup) -> ClusterResult<()> {
        let mut body = ReplicationController::from(spec);
        body.metadata.namespace = Some(self.namespace.clone());
        body.metadata.resource_version = None;

        self.transport
            .post_json(&self.groups_url(), &body)
            .await?
            .check(&self.key(&spec.name))?;

        info!(group = %self.key(&spec.name), replicas = spec.replicas, "created replica group");
        Ok(())
    }

    async fn set_replica_group_size(&self, name: &str, size: u32) -> ClusterResult<u32> {
        // Read-modify-write carrying the freshly read resource version.
        let mut rc = self.get_raw(name).await?;
        let previous = rc.spec.replicas.unwrap_or(0);
        rc.spec.replicas = Some(size);

        let updated: ReplicationController = self
            .transport
            .put_json(&self.group_url(name), &rc)
            .await?
            .json(&self.key(name))?;

        let confirmed = updated.spec.replicas.ok_or_else(|| {
            ClusterError::InvalidResponse(format!(
                "update of {} returned no replica count",
                self.key(name)
            ))
        })?;

        debug!(group = %self.key(name), from = previous, requested = size, confirmed, "resized replica group");
        Ok(confirmed)
    }

    async fn delete_replica_group(&self, name: &str) -> ClusterResult<()> {
        self.transport
            .delete(&self.group_url(name))
            .await?
            .check(&self.key(name))?;

        info!(group = %self.key(name), "deleted replica group");
        Ok(())
    }

    async fn list_pods(&self, group: &str) -> ClusterResult<Vec<PodInstance>> {
        let list: PodList = self
            .transport
            .get(&self.pods_url())
            .await?
            .json(&format!("pods in {}", self.namespace))?;

        let total = list.items.len();
        let mut pods: Vec<PodInstance> = list
            .items
            .into_iter()
            .filter(|p| p.is_live())
            .filter_map(|p| p.into_instance())
            .filter(|p| p.belongs_to(group))
            .collect();
        pods.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(group = %self.key(group), listed = total, matched = pods.len(), "listed pods");
        Ok(pods)
    }
}
