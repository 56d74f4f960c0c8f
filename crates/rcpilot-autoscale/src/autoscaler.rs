//! Autoscaler: periodic snapshot, evaluate, scale.
//!
//! Each tick takes one snapshot of the group, checks the scale-up policy
//! first and the scale-down policy second, and applies at most one delta.
//! A snapshot with no valid pods never triggers scaling.

use std::time::Duration;

use tracing::{debug, info, warn};

use rcpilot_core::AutoscaleConfig;
use rcpilot_metrics::MetricAggregator;

use crate::error::ScaleResult;
use crate::evaluator::ThresholdEvaluator;
use crate::scaler::{ScaleBounds, ScaleOutcome, ScalingController};

/// What one tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoscaleDecision {
    ScaleUp(ScaleOutcome),
    ScaleDown(ScaleOutcome),
    NoChange,
    /// No pod could be sampled.
    NoData,
}

/// Evaluates the scale-up and scale-down policies against fresh snapshots
/// and resizes the group by one step when a policy breaches.
pub struct Autoscaler {
    aggregator: MetricAggregator,
    scaler: ScalingController,
    scale_up: Option<ThresholdEvaluator>,
    scale_down: Option<ThresholdEvaluator>,
    step: u32,
    bounds: ScaleBounds,
}

impl Autoscaler {
    pub fn new(aggregator: MetricAggregator, scaler: ScalingController, bounds: ScaleBounds) -> Self {
        Self {
            aggregator,
            scaler,
            scale_up: None,
            scale_down: None,
            step: 1,
            bounds,
        }
    }

    /// Build from the `[autoscale]` config section.
    pub fn from_config(
        aggregator: MetricAggregator,
        scaler: ScalingController,
        config: &AutoscaleConfig,
    ) -> ScaleResult<Self> {
        let bounds = ScaleBounds::new(config.min_replicas, config.max_replicas)?;
        let mut autoscaler = Self::new(aggregator, scaler, bounds).with_step(config.step);
        if let Some(policy) = &config.scale_up {
            autoscaler = autoscaler.with_scale_up(ThresholdEvaluator::new(policy.clone())?);
        }
        if let Some(policy) = &config.scale_down {
            autoscaler = autoscaler.with_scale_down(ThresholdEvaluator::new(policy.clone())?);
        }
        Ok(autoscaler)
    }

    pub fn with_scale_up(mut self, evaluator: ThresholdEvaluator) -> Self {
        self.scale_up = Some(evaluator);
        self
    }

    pub fn with_scale_down(mut self, evaluator: ThresholdEvaluator) -> Self {
        self.scale_down = Some(evaluator);
        self
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step.max(1);
        self
    }

    /// Run one evaluation for `group`.
    pub async fn tick(&self, group: &str) -> ScaleResult<AutoscaleDecision> {
        let outcome = self.aggregator.snapshot(group).await?;
        let snapshot = &outcome.snapshot;

        if snapshot.valid_pods().next().is_none() {
            warn!(group, pods = snapshot.pods.len(), "no valid pods in snapshot, skipping");
            return Ok(AutoscaleDecision::NoData);
        }

        if let Some(up) = &self.scale_up {
            let eval = up.evaluate_detailed(snapshot);
            debug!(
                group,
                indicator = %up.policy().indicator,
                valid_pods = eval.valid_pods(),
                breaching = eval.breaching_pods(),
                breached = eval.breached,
                "scale-up policy evaluated"
            );
            if eval.breached {
                let result = self.scaler.scale(group, i64::from(self.step), self.bounds).await?;
                return Ok(AutoscaleDecision::ScaleUp(result));
            }
        }

        if let Some(down) = &self.scale_down {
            let eval = down.evaluate_detailed(snapshot);
            debug!(
                group,
                indicator = %down.policy().indicator,
                valid_pods = eval.valid_pods(),
                breaching = eval.breaching_pods(),
                breached = eval.breached,
                "scale-down policy evaluated"
            );
            if eval.breached {
                let result = self.scaler.scale(group, -i64::from(self.step), self.bounds).await?;
                return Ok(AutoscaleDecision::ScaleDown(result));
            }
        }

        Ok(AutoscaleDecision::NoChange)
    }

    /// Tick every `interval` until `shutdown` changes.
    pub async fn run(
        &self,
        group: &str,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(group, interval_secs = interval.as_secs(), "autoscaler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.tick(group).await {
                        Ok(AutoscaleDecision::ScaleUp(o)) | Ok(AutoscaleDecision::ScaleDown(o)) if o.resized => {
                            info!(group, size = o.size, "autoscaler resized group");
                        }
                        Ok(decision) => debug!(group, ?decision, "autoscaler tick"),
                        Err(e) => warn!(group, error = %e, "autoscaler tick failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!(group, "autoscaler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rcpilot_cluster::{ClusterClient, InMemoryCluster, StaticSampler};
    use rcpilot_core::{
        Combinator, ContainerMetricSample, ContainerSpec, Direction, ReplicaGroup, ResourceClass,
        ThresholdPolicy,
    };

    fn memory(values: &[u64]) -> Vec<ContainerMetricSample> {
        values
            .iter()
            .map(|&v| ContainerMetricSample {
                memory_usage: v,
                ..Default::default()
            })
            .collect()
    }

    fn memory_policy(direction: Direction, threshold: f64) -> ThresholdPolicy {
        ThresholdPolicy {
            indicator: ResourceClass::MemoryUsage,
            direction,
            combinator: Combinator::AllMustBreach,
            required_fraction: 0.5,
            threshold,
        }
    }

    async fn setup(replicas: u32, sampler: StaticSampler) -> (InMemoryCluster, Autoscaler) {
        let cluster = InMemoryCluster::new("default");
        cluster
            .insert_group(ReplicaGroup {
                name: "svc-a".to_string(),
                replicas,
                containers: vec![ContainerSpec {
                    name: "app".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await;
        let client: Arc<dyn ClusterClient> = Arc::new(cluster.clone());
        let aggregator = MetricAggregator::new(client.clone(), Arc::new(sampler));
        let autoscaler = Autoscaler::new(
            aggregator,
            ScalingController::new(client),
            ScaleBounds { min: 1, max: 4 },
        )
        .with_scale_up(ThresholdEvaluator::new(memory_policy(Direction::Above, 800.0)).unwrap())
        .with_scale_down(ThresholdEvaluator::new(memory_policy(Direction::Below, 100.0)).unwrap());
        (cluster, autoscaler)
    }

    #[tokio::test]
    async fn hot_group_scales_up() {
        let sampler = StaticSampler::new().with_default(memory(&[900, 950]));
        let (cluster, autoscaler) = setup(2, sampler).await;

        let decision = autoscaler.tick("svc-a").await.unwrap();
        assert_eq!(
            decision,
            AutoscaleDecision::ScaleUp(ScaleOutcome { resized: true, size: 3 })
        );
        assert_eq!(cluster.group("svc-a").await.unwrap().replicas, 3);
    }

    #[tokio::test]
    async fn idle_group_scales_down_to_min() {
        let sampler = StaticSampler::new().with_default(memory(&[10, 20]));
        let (cluster, autoscaler) = setup(1, sampler).await;

        let decision = autoscaler.tick("svc-a").await.unwrap();
        assert_eq!(
            decision,
            AutoscaleDecision::ScaleDown(ScaleOutcome { resized: false, size: 1 })
        );
        assert!(cluster.events().await.is_empty());
    }

    #[tokio::test]
    async fn middle_band_is_no_change() {
        let sampler = StaticSampler::new().with_default(memory(&[400, 500]));
        let (_, autoscaler) = setup(2, sampler).await;
        assert_eq!(autoscaler.tick("svc-a").await.unwrap(), AutoscaleDecision::NoChange);
    }

    #[tokio::test]
    async fn no_valid_pods_skips_scaling() {
        // No default: every target fails to sample.
        let (cluster, autoscaler) = setup(2, StaticSampler::new()).await;
        assert_eq!(autoscaler.tick("svc-a").await.unwrap(), AutoscaleDecision::NoData);
        assert!(cluster.events().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let sampler = StaticSampler::new().with_default(memory(&[900, 950]));
        let (cluster, autoscaler) = setup(1, sampler).await;
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(async move {
            autoscaler.run("svc-a", Duration::from_secs(30), rx).await;
        });

        tokio::time::sleep(Duration::from_secs(65)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Two ticks elapsed: 1 → 2 → 3.
        assert_eq!(cluster.group("svc-a").await.unwrap().replicas, 3);
    }
}
