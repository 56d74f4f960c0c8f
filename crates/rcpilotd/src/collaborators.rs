//! Builds the cluster client and metric sampler for a run.
//!
//! Normal runs talk HTTP to the configured API server and node stats port.
//! `--dry-run` swaps both for in-process fakes seeded with one group, so
//! every subcommand can be exercised without a cluster.

use std::sync::Arc;

use tracing::info;

use rcpilot_cluster::{
    ClusterClient, HttpClusterClient, HttpMetricSampler, InMemoryCluster, MetricSampler,
    StaticSampler,
};
use rcpilot_core::{
    ContainerMetricSample, ContainerPort, ContainerSpec, RcpilotConfig, ReplicaGroup,
};

/// Replicas of the seeded group in dry runs.
pub const DRY_RUN_REPLICAS: u32 = 3;

/// Writes remembered by the in-memory cluster; a dry-run autoscaler can
/// run indefinitely.
pub const DRY_RUN_EVENT_LIMIT: usize = 256;

pub struct Collaborators {
    pub cluster: Arc<dyn ClusterClient>,
    pub sampler: Arc<dyn MetricSampler>,
    /// Set in dry runs so the caller can report what was written.
    pub in_memory: Option<InMemoryCluster>,
}

pub async fn build(config: &RcpilotConfig, dry_run: bool, group: &str) -> Collaborators {
    if dry_run {
        let cluster =
            InMemoryCluster::new(&config.cluster.namespace).with_event_limit(DRY_RUN_EVENT_LIMIT);
        cluster.insert_group(seed_group(group)).await;
        info!(group, replicas = DRY_RUN_REPLICAS, "dry run: using in-memory cluster");
        return Collaborators {
            cluster: Arc::new(cluster.clone()),
            sampler: Arc::new(StaticSampler::new().with_default(synthetic_samples())),
            in_memory: Some(cluster),
        };
    }

    info!(
        api_server = %config.cluster.api_server,
        namespace = %config.cluster.namespace,
        stats_port = config.sampler.port,
        "using cluster api"
    );
    Collaborators {
        cluster: Arc::new(HttpClusterClient::new(
            &config.cluster.api_server,
            &config.cluster.namespace,
            config.cluster_timeout(),
        )),
        sampler: Arc::new(HttpMetricSampler::new(
            config.sampler.port,
            config.sampler_timeout(),
        )),
        in_memory: None,
    }
}

fn seed_group(name: &str) -> ReplicaGroup {
    ReplicaGroup {
        name: name.to_string(),
        replicas: DRY_RUN_REPLICAS,
        selector: [("app".to_string(), name.to_string())].into(),
        containers: vec![ContainerSpec {
            name: "app".to_string(),
            image: format!("{name}:current"),
            ports: vec![ContainerPort {
                name: Some("http".to_string()),
                container_port: 8080,
                protocol: Some("TCP".to_string()),
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Five samples, one second apart: half a core busy, 256 MiB resident.
fn synthetic_samples() -> Vec<ContainerMetricSample> {
    (0..5u64)
        .map(|i| ContainerMetricSample {
            cpu_usage_total: 1_000_000_000 + i * 500_000_000,
            memory_usage: 256 * 1024 * 1024,
            network_rx_bytes: i * 64 * 1024,
            network_tx_bytes: i * 32 * 1024,
            ..Default::default()
        })
        .collect()
}
