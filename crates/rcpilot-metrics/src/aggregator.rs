//! Metric aggregator: assembles replica-group snapshots.
//!
//! One snapshot is built from a single pod listing. Every (pod, container)
//! target is sampled concurrently; results are put back in listing order.
//! A failed target never fails the snapshot: its series is marked invalid
//! and the failure is reported in a `PartialFailure` next to the snapshot.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use rcpilot_cluster::{ClusterClient, MetricSampler};
use rcpilot_core::{MetricSeries, PodMetricSnapshot, ReplicaGroupMetricSnapshot};

use crate::error::{MetricsResult, PartialFailure, TargetFailure};

/// A snapshot plus the targets that could not be sampled.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    pub snapshot: ReplicaGroupMetricSnapshot,
    pub failures: Option<PartialFailure>,
}

impl SnapshotOutcome {
    /// Split into the snapshot and a `Result` carrying the partial failure.
    pub fn into_parts(self) -> (ReplicaGroupMetricSnapshot, Result<(), PartialFailure>) {
        let result = match self.failures {
            Some(failures) => Err(failures),
            None => Ok(()),
        };
        (self.snapshot, result)
    }
}

/// Builds `ReplicaGroupMetricSnapshot`s from the cluster and a sampler.
#[derive(Clone)]
pub struct MetricAggregator {
    cluster: Arc<dyn ClusterClient>,
    sampler: Arc<dyn MetricSampler>,
}

impl MetricAggregator {
    pub fn new(cluster: Arc<dyn ClusterClient>, sampler: Arc<dyn MetricSampler>) -> Self {
        Self { cluster, sampler }
    }

    /// Snapshot every live pod of `group`.
    ///
    /// Fails only when the group or its pods cannot be read.
    pub async fn snapshot(&self, group: &str) -> MetricsResult<SnapshotOutcome> {
        let generation = self.cluster.get_replica_group(group).await?.resource_version;
        let pods = self.cluster.list_pods(group).await?;

        let targets: Vec<(usize, usize)> = pods
            .iter()
            .enumerate()
            .flat_map(|(p, pod)| (0..pod.containers.len()).map(move |c| (p, c)))
            .collect();

        let results = join_all(targets.iter().map(|&(p, c)| {
            let pod = &pods[p];
            self.sampler.sample_container(pod, &pod.containers[c].name)
        }))
        .await;

        let mut failures = Vec::new();
        let mut per_pod: Vec<Vec<MetricSeries>> = pods
            .iter()
            .map(|pod| Vec::with_capacity(pod.containers.len()))
            .collect();

        for (&(p, c), result) in targets.iter().zip(results) {
            let pod = &pods[p];
            let container = &pod.containers[c].name;
            let series = match result {
                Ok(series) if series.valid => series,
                Ok(_) => {
                    failures.push(target_failure(p, Some(c), &pod.name, container, "sampler marked series invalid"));
                    MetricSeries::invalid(container.as_str())
                }
                Err(e) => {
                    failures.push(target_failure(p, Some(c), &pod.name, container, &e.to_string()));
                    MetricSeries::invalid(container.as_str())
                }
            };
            per_pod[p].push(series);
        }

        let snapshots: Vec<PodMetricSnapshot> = pods
            .into_iter()
            .zip(per_pod)
            .enumerate()
            .map(|(p, (pod, series))| {
                if series.is_empty() {
                    failures.push(TargetFailure {
                        pod_index: p,
                        container_index: None,
                        pod: pod.name.clone(),
                        container: None,
                        reason: "pod has no containers".to_string(),
                    });
                }
                let valid = series.iter().any(|s| s.valid);
                PodMetricSnapshot {
                    pod: pod.name,
                    host: pod.host,
                    valid,
                    series,
                }
            })
            .collect();

        let snapshot = ReplicaGroupMetricSnapshot {
            group: group.to_string(),
            generation,
            pods: snapshots,
        };

        failures.sort_by_key(|f| (f.pod_index, f.container_index));
        let failures = if failures.is_empty() {
            None
        } else {
            let failure = PartialFailure {
                total: targets.len(),
                failures,
            };
            warn!(group, error = %failure, "partial metric snapshot");
            Some(failure)
        };

        debug!(
            group,
            pods = snapshot.pods.len(),
            valid_pods = snapshot.valid_pods().count(),
            "metric snapshot assembled"
        );

        Ok(SnapshotOutcome { snapshot, failures })
    }
}

fn target_failure(
    pod_index: usize,
    container_index: Option<usize>,
    pod: &str,
    container: &str,
    reason: &str,
) -> TargetFailure {
    TargetFailure {
        pod_index,
        container_index,
        pod: pod.to_string(),
        container: Some(container.to_string()),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcpilot_cluster::{ClusterError, FaultOp, InMemoryCluster, StaticSampler};
    use rcpilot_core::{ContainerMetricSample, ContainerSpec, PodContainer, PodInstance, ReplicaGroup};

    fn sample(cpu: u64) -> ContainerMetricSample {
        ContainerMetricSample {
            cpu_usage_total: cpu,
            ..Default::default()
        }
    }

    fn pod(name: &str, containers: &[&str]) -> PodInstance {
        PodInstance {
            name: name.to_string(),
            generate_name: Some("svc-a-".to_string()),
            host: Some("10.0.0.1".to_string()),
            containers: containers
                .iter()
                .map(|c| PodContainer {
                    name: c.to_string(),
                    id: Some(format!("{name}-{c}")),
                })
                .collect(),
        }
    }

    async fn cluster_with(pods: Vec<PodInstance>) -> InMemoryCluster {
        let cluster = InMemoryCluster::new("default");
        cluster
            .insert_group(ReplicaGroup {
                name: "svc-a".to_string(),
                replicas: 0,
                containers: vec![ContainerSpec {
                    name: "app".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await;
        cluster.set_pods("svc-a", pods).await;
        cluster
    }

    #[tokio::test]
    async fn one_failing_pod_marks_it_invalid() {
        let cluster = cluster_with(vec![pod("svc-a-1", &["app"]), pod("svc-a-2", &["app"])]).await;
        let sampler = StaticSampler::new()
            .with_series("svc-a-1", "app", vec![sample(1), sample(5)])
            .with_failure("svc-a-2", "app", "connection refused");

        let aggregator = MetricAggregator::new(Arc::new(cluster), Arc::new(sampler));
        let outcome = aggregator.snapshot("svc-a").await.unwrap();

        assert_eq!(outcome.snapshot.validity(), vec![true, false]);
        assert!(outcome.snapshot.pods[1].series[0].samples.is_empty());
        assert!(outcome.snapshot.generation.is_some());

        let failures = outcome.failures.unwrap();
        assert_eq!(failures.total, 2);
        assert_eq!(failures.pod_indices(), vec![1]);
        assert!(failures.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn pod_stays_valid_while_one_container_samples() {
        let cluster = cluster_with(vec![pod("svc-a-1", &["app", "sidecar"])]).await;
        let sampler = StaticSampler::new()
            .with_series("svc-a-1", "app", vec![sample(1)])
            .with_failure("svc-a-1", "sidecar", "not started");

        let aggregator = MetricAggregator::new(Arc::new(cluster), Arc::new(sampler));
        let outcome = aggregator.snapshot("svc-a").await.unwrap();

        let pod = &outcome.snapshot.pods[0];
        assert!(pod.valid);
        assert_eq!(pod.container_validity(), vec![true, false]);
        assert_eq!(outcome.failures.unwrap().failures[0].container_index, Some(1));
    }

    #[tokio::test]
    async fn pod_without_containers_is_invalid() {
        let cluster = cluster_with(vec![pod("svc-a-1", &[])]).await;
        let aggregator = MetricAggregator::new(Arc::new(cluster), Arc::new(StaticSampler::new()));
        let outcome = aggregator.snapshot("svc-a").await.unwrap();

        assert_eq!(outcome.snapshot.validity(), vec![false]);
        assert_eq!(outcome.failures.unwrap().failures[0].container_index, None);
    }

    #[tokio::test]
    async fn clean_snapshot_has_no_failures() {
        let cluster = cluster_with(vec![pod("svc-a-1", &["app"])]).await;
        let sampler = StaticSampler::new().with_default(vec![sample(1), sample(2)]);
        let aggregator = MetricAggregator::new(Arc::new(cluster), Arc::new(sampler));

        let (snapshot, result) = aggregator.snapshot("svc-a").await.unwrap().into_parts();
        assert!(result.is_ok());
        assert_eq!(snapshot.pods[0].series[0].len(), 2);
    }

    #[tokio::test]
    async fn listing_failure_fails_the_snapshot() {
        let cluster = cluster_with(vec![pod("svc-a-1", &["app"])]).await;
        cluster
            .fail_next(FaultOp::ListPods, "svc-a", ClusterError::Transport("reset".into()))
            .await;
        let aggregator = MetricAggregator::new(Arc::new(cluster), Arc::new(StaticSampler::new()));
        assert!(aggregator.snapshot("svc-a").await.is_err());
    }
}
