//! Threshold evaluator: decides whether a group snapshot breaches a policy.
//!
//! Pure and deterministic: the same snapshot and policy always give the
//! same answer, and nothing here touches the network.

use rcpilot_core::{
    Combinator, MetricSeries, PodMetricSnapshot, PolicyError, ReplicaGroupMetricSnapshot,
    ThresholdPolicy,
};

/// Per-pod verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodEvaluation {
    pub pod: String,
    pub breaching: bool,
}

/// Breakdown of one evaluation, mostly for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub breached: bool,
    /// Verdicts for valid pods only, in snapshot order.
    pub pods: Vec<PodEvaluation>,
}

impl Evaluation {
    pub fn valid_pods(&self) -> usize {
        self.pods.len()
    }

    pub fn breaching_pods(&self) -> usize {
        self.pods.iter().filter(|p| p.breaching).count()
    }
}

/// Evaluates one validated `ThresholdPolicy`.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    policy: ThresholdPolicy,
}

impl ThresholdEvaluator {
    pub fn new(policy: ThresholdPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn evaluate(&self, snapshot: &ReplicaGroupMetricSnapshot) -> bool {
        self.evaluate_detailed(snapshot).breached
    }

    pub fn evaluate_detailed(&self, snapshot: &ReplicaGroupMetricSnapshot) -> Evaluation {
        let pods: Vec<PodEvaluation> = snapshot
            .valid_pods()
            .map(|pod| PodEvaluation {
                pod: pod.pod.clone(),
                breaching: self.pod_breaches(pod),
            })
            .collect();

        let breached = match self.policy.combinator {
            // Vacuously true with no valid pods.
            Combinator::AllMustBreach => pods.iter().all(|p| p.breaching),
            Combinator::AnyMayBreach => pods.iter().any(|p| p.breaching),
        };

        Evaluation { breached, pods }
    }

    /// A pod breaches when any of its valid containers does.
    pub fn pod_breaches(&self, pod: &PodMetricSnapshot) -> bool {
        pod.valid_series().any(|series| self.series_breaches(series))
    }

    pub fn series_breaches(&self, series: &MetricSeries) -> bool {
        let raw = series.values(self.policy.indicator);
        let values = if self.policy.indicator.is_cumulative() {
            delta_series(&raw)
        } else {
            raw
        };
        self.fraction_breaches(&values)
    }

    /// `count / len >= required_fraction`; an empty series never breaches.
    pub fn fraction_breaches(&self, values: &[f64]) -> bool {
        if values.is_empty() {
            return false;
        }
        let count = values
            .iter()
            .filter(|&&v| self.policy.direction.breaches(v, self.policy.threshold))
            .count();
        count as f64 / values.len() as f64 >= self.policy.required_fraction
    }
}

/// Adjacent differences of a cumulative counter: length `N - 1`, empty for
/// `N <= 1`.
pub fn delta_series(raw: &[f64]) -> Vec<f64> {
    raw.windows(2).map(|w| w[1] - w[0]).collect()
}
