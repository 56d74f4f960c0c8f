//! rcpilot-metrics: metric snapshots for replica groups.
//!
//! # Architecture
//!
//! ```text
//! MetricAggregator
//!   ├── ClusterClient::get_replica_group()  → generation
//!   ├── ClusterClient::list_pods()          → live pods
//!   └── MetricSampler::sample_container()   → one series per (pod, container), concurrent
//!         ↓
//!   SnapshotOutcome { snapshot, failures: Option<PartialFailure> }
//! ```

pub mod aggregator;
pub mod error;

pub use aggregator::{MetricAggregator, SnapshotOutcome};
pub use error::{MetricsError, MetricsResult, PartialFailure, TargetFailure};
