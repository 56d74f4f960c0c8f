//! Scaling controller: bounded replica-count deltas.
//!
//! Read the current size, clamp `current + delta` into the bounds, and
//! write only when the clamped size differs. The size reported after a
//! write is the one the cluster confirmed, so a concurrent writer shows up
//! as a mismatch instead of being hidden.
//!
//! Callers serialize calls per replica group; there is no version check
//! between the read and the write.

use std::sync::Arc;

use tracing::{debug, info};

use rcpilot_cluster::ClusterClient;

use crate::error::{ScaleError, ScaleResult};

/// Inclusive replica-count bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleBounds {
    pub min: u32,
    pub max: u32,
}

impl ScaleBounds {
    pub fn new(min: u32, max: u32) -> ScaleResult<Self> {
        let bounds = Self { min, max };
        bounds.check()?;
        Ok(bounds)
    }

    fn check(&self) -> ScaleResult<()> {
        if self.min > self.max {
            return Err(ScaleError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// `clamp(current + delta, min, max)`; the sum saturates instead of
    /// overflowing.
    pub fn apply(&self, current: u32, delta: i64) -> u32 {
        i64::from(current)
            .saturating_add(delta)
            .clamp(i64::from(self.min), i64::from(self.max)) as u32
    }
}

/// Result of one `scale` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleOutcome {
    /// Whether a write was issued.
    pub resized: bool,
    /// The unchanged size, or the size confirmed by the write.
    pub size: u32,
}

/// Applies bounded size deltas to replica groups through a `ClusterClient`.
#[derive(Clone)]
pub struct ScalingController {
    cluster: Arc<dyn ClusterClient>,
}

impl ScalingController {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Move `group` by `delta` replicas, clamped into `bounds`.
    pub async fn scale(&self, group: &str, delta: i64, bounds: ScaleBounds) -> ScaleResult<ScaleOutcome> {
        bounds.check()?;

        let current = self.cluster.get_replica_group(group).await?.replicas;
        let target = bounds.apply(current, delta);
        if target == current {
            debug!(group, size = current, delta, "size unchanged, no write");
            return Ok(ScaleOutcome {
                resized: false,
                size: current,
            });
        }

        let confirmed = self.cluster.set_replica_group_size(group, target).await?;
        info!(group, from = current, to = target, confirmed, "scaled replica group");
        Ok(ScaleOutcome {
            resized: true,
            size: confirmed,
        })
    }
}
