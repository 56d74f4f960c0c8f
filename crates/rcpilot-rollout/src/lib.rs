//! rcpilot rolling replacement.
//!
//! Replaces a replica group with a newly versioned copy one replica at a
//! time: grow the new group by one, shrink the old group by one, wait,
//! repeat, then delete the old group.
//!
//! # Components
//!
//! - **`request`**: what to roll out and how the new group is derived
//! - **`controller`**: the rollout state machine

pub mod controller;
pub mod error;
pub mod request;

pub use controller::{RolloutController, RolloutPhase, RolloutReport, RolloutState, RolloutStep, Side};
pub use error::{RolloutError, RolloutResult};
pub use request::RolloutRequest;
