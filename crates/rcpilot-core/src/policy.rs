//! Threshold policies.

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::metrics::ResourceClass;

/// Which side of the threshold counts as a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `value > threshold` breaches.
    Above,
    /// `value < threshold` breaches.
    Below,
}

impl Direction {
    pub fn breaches(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Above => value > threshold,
            Direction::Below => value < threshold,
        }
    }
}

/// How per-pod verdicts combine into the group decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Combinator {
    /// Every valid pod must breach (vacuously true with no valid pods).
    AllMustBreach,
    /// At least one valid pod must breach.
    AnyMayBreach,
}

/// When a replica group counts as breaching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdPolicy {
    pub indicator: ResourceClass,
    pub direction: Direction,
    pub combinator: Combinator,
    /// Fraction of a container's samples that must breach (0.0–1.0).
    pub required_fraction: f64,
    pub threshold: f64,
}

impl ThresholdPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0.0..=1.0).contains(&self.required_fraction) {
            return Err(PolicyError::FractionOutOfRange(self.required_fraction));
        }
        if !self.threshold.is_finite() {
            return Err(PolicyError::NonFiniteThreshold(self.threshold));
        }
        Ok(())
    }
}
