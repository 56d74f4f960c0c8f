//! rcpilot-cluster: everything that talks to the outside world.
//!
//! The controllers only see two traits: [`ClusterClient`] (replica groups
//! and pods) and [`MetricSampler`] (per-container stats). This crate
//! provides the HTTP implementations and the JSON translation layer they
//! share, plus an in-memory cluster used for tests and dry runs.
//!
//! # Architecture
//!
//! ```text
//! ClusterClient ── HttpClusterClient ──┐
//!               └─ InMemoryCluster      ├── wire (typed JSON ⇄ rcpilot-core)
//! MetricSampler ── HttpMetricSampler ──┘       │
//!               └─ StaticSampler            transport (hyper http1)
//! ```

pub mod client;
pub mod error;
pub mod kube;
pub mod memory;
pub mod stats;
pub mod transport;
pub mod wire;

pub use client::{ClusterClient, MetricSampler};
pub use error::{ClusterError, ClusterResult};
pub use kube::HttpClusterClient;
pub use memory::{ClusterEvent, FaultOp, InMemoryCluster, StaticSampler};
pub use stats::HttpMetricSampler;
