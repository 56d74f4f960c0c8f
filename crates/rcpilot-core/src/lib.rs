//! rcpilot-core: shared types for the rcpilot control-plane helper.
//!
//! Everything the controllers exchange lives here: the typed view of a
//! replica group and its pods, per-container metric series and the
//! snapshots built from them, threshold policies, and the `rcpilot.toml`
//! configuration.
//!
//! # Layout
//!
//! ```text
//! types  : ReplicaGroup, PodInstance, ContainerSpec
//! metrics: ResourceClass, ContainerMetricSample, MetricSeries, snapshots
//! policy : ThresholdPolicy (indicator, direction, combinator, fraction)
//! config : RcpilotConfig (toml)
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod types;

pub use config::{AutoscaleConfig, ClusterConfig, RcpilotConfig, RolloutConfig, SamplerConfig};
pub use error::PolicyError;
pub use metrics::*;
pub use policy::{Combinator, Direction, ThresholdPolicy};
pub use types::*;
