//! rcpilot-autoscale: metrics-threshold scaling.
//!
//! - **`evaluator`**: pure breach decision over a group snapshot
//! - **`scaler`**: clamped, idempotent replica-count deltas
//! - **`autoscaler`**: periodic snapshot → evaluate → scale loop

pub mod autoscaler;
pub mod error;
pub mod evaluator;
pub mod scaler;

pub use autoscaler::{Autoscaler, AutoscaleDecision};
pub use error::{ScaleError, ScaleResult};
pub use evaluator::{Evaluation, PodEvaluation, ThresholdEvaluator, delta_series};
pub use scaler::{ScaleBounds, ScaleOutcome, ScalingController};
