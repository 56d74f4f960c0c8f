//! In-process collaborators for tests and dry runs.
//!
//! `InMemoryCluster` behaves like a tiny API server: it stores replica
//! groups, keeps one pod per replica (named `{group}-{n}` with generated
//! name `{group}-`), records writes as `ClusterEvent`s, and can be told to
//! fail the next call of a given kind. The event log is unbounded unless a
//! limit is set, in which case the oldest events are dropped first.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use rcpilot_core::{ContainerMetricSample, MetricSeries, PodContainer, PodInstance, ReplicaGroup};

use crate::client::{ClusterClient, MetricSampler};
use crate::error::{ClusterError, ClusterResult};

/// A write observed by the in-memory cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    Created { name: String, replicas: u32 },
    Resized { name: String, from: u32, to: u32 },
    Deleted { name: String },
}

/// Call kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Get,
    Create,
    Resize,
    Delete,
    ListPods,
}

#[derive(Default)]
struct Inner {
    groups: BTreeMap<String, ReplicaGroup>,
    pods: BTreeMap<String, Vec<PodInstance>>,
    events: VecDeque<ClusterEvent>,
    faults: HashMap<(FaultOp, String), VecDeque<ClusterError>>,
    /// Confirmed sizes to report instead of the requested one.
    confirm_overrides: HashMap<String, VecDeque<u32>>,
    next_pod: u64,
    next_version: u64,
}

impl Inner {
    fn take_fault(&mut self, op: FaultOp, name: &str) -> ClusterResult<()> {
        match self
            .faults
            .get_mut(&(op, name.to_string()))
            .and_then(|q| q.pop_front())
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    /// Keep exactly `replicas` pods for a group.
    fn reconcile_pods(&mut self, group: &ReplicaGroup) {
        let pods = self.pods.entry(group.name.clone()).or_default();
        while pods.len() > group.replicas as usize {
            pods.pop();
        }
        while pods.len() < group.replicas as usize {
            self.next_pod += 1;
            let name = format!("{}-{}", group.name, self.next_pod);
            let containers = group
                .containers
                .iter()
                .map(|c| PodContainer {
                    name: c.name.clone(),
                    id: Some(format!("{name}-{}", c.name)),
                })
                .collect();
            pods.push(PodInstance {
                host: Some(format!("10.0.{}.{}", self.next_pod / 250, self.next_pod % 250 + 1)),
                name,
                generate_name: Some(format!("{}-", group.name)),
                containers,
            });
        }
    }
}

/// Thread-safe in-memory replica-group store.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    namespace: String,
    event_limit: Option<usize>,
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryCluster {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            event_limit: None,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Keep at most `limit` events, for long-running dry runs.
    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = Some(limit);
        self
    }

    fn record(&self, inner: &mut Inner, event: ClusterEvent) {
        inner.events.push_back(event);
        if let Some(limit) = self.event_limit {
            while inner.events.len() > limit {
                inner.events.pop_front();
            }
        }
    }

    /// Seed a group (and its pods) without recording an event.
    pub async fn insert_group(&self, mut group: ReplicaGroup) {
        let mut inner = self.inner.lock().await;
        group.namespace = self.namespace.clone();
        group.resource_version = Some(inner.bump_version());
        inner.reconcile_pods(&group);
        inner.groups.insert(group.name.clone(), group);
    }

    /// Replace the pod list of a group.
    pub async fn set_pods(&self, group: &str, pods: Vec<PodInstance>) {
        self.inner.lock().await.pods.insert(group.to_string(), pods);
    }

    /// Make the next `op` call against `name` fail with `err`.
    pub async fn fail_next(&self, op: FaultOp, name: &str, err: ClusterError) {
        self.inner
            .lock()
            .await
            .faults
            .entry((op, name.to_string()))
            .or_default()
            .push_back(err);
    }

    /// Make the next resize of `name` confirm `size` regardless of what was
    /// requested, as if another writer raced it.
    pub async fn confirm_next_resize_as(&self, name: &str, size: u32) {
        self.inner
            .lock()
            .await
            .confirm_overrides
            .entry(name.to_string())
            .or_default()
            .push_back(size);
    }

    /// Recorded writes, oldest first.
    pub async fn events(&self) -> Vec<ClusterEvent> {
        self.inner.lock().await.events.iter().cloned().collect()
    }

    /// Remove and return the recorded writes.
    pub async fn take_events(&self) -> Vec<ClusterEvent> {
        self.inner.lock().await.events.drain(..).collect()
    }

    pub async fn group(&self, name: &str) -> Option<ReplicaGroup> {
        self.inner.lock().await.groups.get(name).cloned()
    }

    pub async fn group_names(&self) -> Vec<String> {
        self.inner.lock().await.groups.keys().cloned().collect()
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_replica_group(&self, name: &str) -> ClusterResult<ReplicaGroup> {
        let mut inner = self.inner.lock().await;
        inner.take_fault(FaultOp::Get, name)?;
        inner
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("{}/{}", self.namespace, name)))
    }

    async fn create_replica_group(&self, spec: &ReplicaGroup) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_fault(FaultOp::Create, &spec.name)?;
        if inner.groups.contains_key(&spec.name) {
            return Err(ClusterError::AlreadyExists(format!(
                "{}/{}",
                self.namespace, spec.name
            )));
        }

        let mut group = spec.clone();
        group.namespace = self.namespace.clone();
        group.resource_version = Some(inner.bump_version());
        inner.reconcile_pods(&group);
        let event = ClusterEvent::Created {
            name: group.name.clone(),
            replicas: group.replicas,
        };
        self.record(&mut inner, event);
        debug!(group = %group.name, replicas = group.replicas, "in-memory create");
        inner.groups.insert(group.name.clone(), group);
        Ok(())
    }

    async fn set_replica_group_size(&self, name: &str, size: u32) -> ClusterResult<u32> {
        let mut inner = self.inner.lock().await;
        inner.take_fault(FaultOp::Resize, name)?;
        let confirmed = inner
            .confirm_overrides
            .get_mut(name)
            .and_then(|q| q.pop_front())
            .unwrap_or(size);
        let version = inner.bump_version();

        let group = inner
            .groups
            .get_mut(name)
            .ok_or_else(|| ClusterError::NotFound(format!("{}/{}", self.namespace, name)))?;
        let from = group.replicas;
        group.replicas = confirmed;
        group.resource_version = Some(version);
        let snapshot = group.clone();

        inner.reconcile_pods(&snapshot);
        self.record(
            &mut inner,
            ClusterEvent::Resized {
                name: name.to_string(),
                from,
                to: confirmed,
            },
        );
        debug!(group = %name, from, to = confirmed, "in-memory resize");
        Ok(confirmed)
    }

    async fn delete_replica_group(&self, name: &str) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_fault(FaultOp::Delete, name)?;
        if inner.groups.remove(name).is_none() {
            return Err(ClusterError::NotFound(format!("{}/{}", self.namespace, name)));
        }
        inner.pods.remove(name);
        self.record(
            &mut inner,
            ClusterEvent::Deleted {
                name: name.to_string(),
            },
        );
        debug!(group = %name, "in-memory delete");
        Ok(())
    }

    async fn list_pods(&self, group: &str) -> ClusterResult<Vec<PodInstance>> {
        let mut inner = self.inner.lock().await;
        inner.take_fault(FaultOp::ListPods, group)?;
        Ok(inner
            .pods
            .get(group)
            .map(|pods| pods.iter().filter(|p| p.belongs_to(group)).cloned().collect())
            .unwrap_or_default())
    }
}

enum Canned {
    Samples(Vec<ContainerMetricSample>),
    Failure(String),
}

/// Sampler returning canned series keyed by `(pod, container)`.
///
/// Targets without an entry get the default samples when one is set and a
/// sampling error otherwise.
#[derive(Default)]
pub struct StaticSampler {
    series: HashMap<(String, String), Canned>,
    default: Option<Vec<ContainerMetricSample>>,
}

impl StaticSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(
        mut self,
        pod: &str,
        container: &str,
        samples: Vec<ContainerMetricSample>,
    ) -> Self {
        self.series.insert(
            (pod.to_string(), container.to_string()),
            Canned::Samples(samples),
        );
        self
    }

    pub fn with_failure(mut self, pod: &str, container: &str, reason: &str) -> Self {
        self.series.insert(
            (pod.to_string(), container.to_string()),
            Canned::Failure(reason.to_string()),
        );
        self
    }

    pub fn with_default(mut self, samples: Vec<ContainerMetricSample>) -> Self {
        self.default = Some(samples);
        self
    }
}

#[async_trait]
impl MetricSampler for StaticSampler {
    async fn sample_container(
        &self,
        pod: &PodInstance,
        container: &str,
    ) -> ClusterResult<MetricSeries> {
        match self.series.get(&(pod.name.clone(), container.to_string())) {
            Some(Canned::Samples(samples)) => Ok(MetricSeries::valid(container, samples.clone())),
            Some(Canned::Failure(reason)) => {
                Err(ClusterError::sampling(&pod.name, container, reason.clone()))
            }
            None => match &self.default {
                Some(samples) => Ok(MetricSeries::valid(container, samples.clone())),
                None => Err(ClusterError::sampling(&pod.name, container, "no samples recorded")),
            },
        }
    }
}
