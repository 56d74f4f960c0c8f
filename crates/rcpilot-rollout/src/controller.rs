//! Rollout controller: drives one replacement to completion or failure.
//!
//! ```text
//! Initializing ──► Scaling ──► Converged ──► CleaningUp ──► (completed)
//!      │              │                          │
//!      └──────────────┴──────────► Failed ◄──────┘
//! ```
//!
//! Every step is awaited in order and separated by one interval. A failed
//! rollout leaves the new group where it is; re-running starts over from
//! Initializing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use rcpilot_autoscale::{ScaleBounds, ScaleOutcome, ScalingController};
use rcpilot_cluster::ClusterClient;

use crate::error::{RolloutError, RolloutResult};
use crate::request::RolloutRequest;

/// Phase of a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RolloutPhase {
    Initializing,
    Scaling,
    Converged,
    CleaningUp,
    Failed,
}

/// Which group a step acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    New,
    Old,
}

/// One scaling step as observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RolloutStep {
    pub side: Side,
    pub resized: bool,
    /// Size confirmed by the cluster after the step.
    pub size: u32,
}

/// Progress of a rollout, owned and mutated by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloutState {
    pub old_group: String,
    /// Set once the new group's name is known, before it is created.
    pub new_group: Option<String>,
    pub desired: u32,
    pub old_size: u32,
    pub new_size: u32,
    pub phase: RolloutPhase,
    /// True once the old group has been deleted.
    pub completed: bool,
    /// Every phase entered, in order.
    pub phases: Vec<RolloutPhase>,
    pub steps: Vec<RolloutStep>,
}

impl RolloutState {
    fn new(old_group: &str) -> Self {
        Self {
            old_group: old_group.to_string(),
            new_group: None,
            desired: 0,
            old_size: 0,
            new_size: 0,
            phase: RolloutPhase::Initializing,
            completed: false,
            phases: vec![RolloutPhase::Initializing],
            steps: Vec::new(),
        }
    }

    fn enter(&mut self, phase: RolloutPhase) {
        debug!(old = %self.old_group, from = ?self.phase, to = ?phase, "rollout phase");
        self.phase = phase;
        self.phases.push(phase);
    }

    /// Sizes confirmed for one side, in step order.
    pub fn sizes(&self, side: Side) -> Vec<u32> {
        self.steps
            .iter()
            .filter(|s| s.side == side)
            .map(|s| s.size)
            .collect()
    }

    fn is_converged(&self) -> bool {
        self.new_size >= self.desired && self.old_size == 0
    }
}

/// Final state of a rollout plus the error that stopped it, if any.
#[derive(Debug)]
pub struct RolloutReport {
    pub state: RolloutState,
    pub error: Option<RolloutError>,
}

impl RolloutReport {
    /// No error and the old group was deleted.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.state.completed
    }

    /// The final state, or the error that stopped the rollout.
    pub fn into_result(self) -> RolloutResult<RolloutState> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.state),
        }
    }
}

/// Replaces one replica group with a new one, a replica at a time.
pub struct RolloutController {
    cluster: Arc<dyn ClusterClient>,
    scaler: ScalingController,
    interval: Duration,
}

impl RolloutController {
    pub fn new(cluster: Arc<dyn ClusterClient>, interval: Duration) -> Self {
        Self {
            scaler: ScalingController::new(cluster.clone()),
            cluster,
            interval,
        }
    }

    /// Run a rollout to the end. Never returns early: the report carries
    /// the final phase and the error.
    pub async fn run(&self, request: &RolloutRequest) -> RolloutReport {
        let mut state = RolloutState::new(&request.old_group);

        match self.drive(request, &mut state).await {
            Ok(()) => {
                info!(
                    old = %state.old_group,
                    new = state.new_group.as_deref().unwrap_or_default(),
                    size = state.new_size,
                    "rollout completed"
                );
                RolloutReport { state, error: None }
            }
            Err(e) => {
                let failed_in = state.phase;
                state.enter(RolloutPhase::Failed);
                error!(
                    old = %state.old_group,
                    new = state.new_group.as_deref().unwrap_or_default(),
                    phase = ?failed_in,
                    new_size = state.new_size,
                    old_size = state.old_size,
                    error = %e,
                    "rollout failed, new group left in place"
                );
                RolloutReport {
                    state,
                    error: Some(e),
                }
            }
        }
    }

    async fn drive(&self, request: &RolloutRequest, state: &mut RolloutState) -> RolloutResult<()> {
        request.validate()?;

        // Initializing
        let old = self.cluster.get_replica_group(&request.old_group).await?;
        let spec = request.build_new_group(&old)?;
        let new_name = spec.name.clone();

        state.desired = old.replicas;
        state.old_size = old.replicas;
        state.new_group = Some(new_name.clone());

        self.cluster.create_replica_group(&spec).await?;
        info!(
            old = %old.name,
            new = %new_name,
            image = %request.image,
            desired = state.desired,
            "created new replica group"
        );

        // Scaling
        state.enter(RolloutPhase::Scaling);
        let bounds = ScaleBounds {
            min: 0,
            max: state.desired,
        };
        while !state.is_converged() {
            tokio::time::sleep(self.interval).await;
            let outcome = self.scaler.scale(&new_name, 1, bounds).await?;
            self.observe(state, Side::New, &new_name, outcome)?;

            tokio::time::sleep(self.interval).await;
            let outcome = self.scaler.scale(&old.name, -1, bounds).await?;
            self.observe(state, Side::Old, &old.name, outcome)?;
        }
        state.enter(RolloutPhase::Converged);

        // CleaningUp
        state.enter(RolloutPhase::CleaningUp);
        tokio::time::sleep(self.interval).await;
        self.cluster.delete_replica_group(&old.name).await?;
        info!(old = %old.name, "deleted old replica group");
        state.completed = true;
        Ok(())
    }

    /// Record a confirmed size; a size outside `[0, desired]` fails the
    /// rollout instead of being clamped.
    fn observe(
        &self,
        state: &mut RolloutState,
        side: Side,
        group: &str,
        outcome: ScaleOutcome,
    ) -> RolloutResult<()> {
        state.steps.push(RolloutStep {
            side,
            resized: outcome.resized,
            size: outcome.size,
        });
        if outcome.size > state.desired {
            return Err(RolloutError::InvariantViolation {
                group: group.to_string(),
                size: outcome.size,
                desired: state.desired,
            });
        }
        match side {
            Side::New => state.new_size = outcome.size,
            Side::Old => state.old_size = outcome.size,
        }
        debug!(
            group,
            side = ?side,
            resized = outcome.resized,
            new_size = state.new_size,
            old_size = state.old_size,
            "rollout step"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RolloutState {
        let mut s = RolloutState::new("svc-a");
        s.desired = 2;
        s.old_size = 2;
        s
    }

    #[test]
    fn starts_initializing() {
        let s = RolloutState::new("svc-a");
        assert_eq!(s.phase, RolloutPhase::Initializing);
        assert_eq!(s.phases, vec![RolloutPhase::Initializing]);
        assert!(s.new_group.is_none());
    }

    #[test]
    fn convergence_needs_both_sides() {
        let mut s = state();
        assert!(!s.is_converged());
        s.new_size = 2;
        assert!(!s.is_converged());
        s.old_size = 0;
        assert!(s.is_converged());
    }

    #[test]
    fn sizes_are_split_by_side() {
        let mut s = state();
        for (side, size) in [(Side::New, 1), (Side::Old, 1), (Side::New, 2), (Side::Old, 0)] {
            s.steps.push(RolloutStep {
                side,
                resized: true,
                size,
            });
        }
        assert_eq!(s.sizes(Side::New), vec![1, 2]);
        assert_eq!(s.sizes(Side::Old), vec![1, 0]);
    }
}
