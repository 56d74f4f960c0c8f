//! Metric samples, series, and snapshots.
//!
//! A `MetricSeries` holds raw samples exactly as the sampler returned them:
//! cumulative counters stay cumulative here. Differencing happens in the
//! threshold evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GroupName, PodName};

/// A resource class captured in every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    /// Total CPU time consumed (nanoseconds, monotonic).
    #[serde(alias = "cpu")]
    CpuUsageTotal,
    /// Current memory usage (bytes, gauge).
    #[serde(alias = "memory")]
    MemoryUsage,
    /// Bytes transferred by block I/O, summed across devices.
    DiskIoBytes,
    /// Block I/O operations, summed across devices.
    DiskIoOps,
    NetworkRxBytes,
    NetworkTxBytes,
    NetworkRxPackets,
    NetworkTxPackets,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 8] = [
        ResourceClass::CpuUsageTotal,
        ResourceClass::MemoryUsage,
        ResourceClass::DiskIoBytes,
        ResourceClass::DiskIoOps,
        ResourceClass::NetworkRxBytes,
        ResourceClass::NetworkTxBytes,
        ResourceClass::NetworkRxPackets,
        ResourceClass::NetworkTxPackets,
    ];

    /// Whether values only ever increase and must be differenced.
    pub fn is_cumulative(self) -> bool {
        !matches!(self, ResourceClass::MemoryUsage)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::CpuUsageTotal => "cpu-usage-total",
            ResourceClass::MemoryUsage => "memory-usage",
            ResourceClass::DiskIoBytes => "disk-io-bytes",
            ResourceClass::DiskIoOps => "disk-io-ops",
            ResourceClass::NetworkRxBytes => "network-rx-bytes",
            ResourceClass::NetworkTxBytes => "network-tx-bytes",
            ResourceClass::NetworkRxPackets => "network-rx-packets",
            ResourceClass::NetworkTxPackets => "network-tx-packets",
        }
    }
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All resource values for one container at one sampling instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContainerMetricSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub cpu_usage_total: u64,
    pub memory_usage: u64,
    pub disk_io_bytes: u64,
    pub disk_io_ops: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub network_rx_packets: u64,
    pub network_tx_packets: u64,
}

impl ContainerMetricSample {
    pub fn value(&self, class: ResourceClass) -> u64 {
        match class {
            ResourceClass::CpuUsageTotal => self.cpu_usage_total,
            ResourceClass::MemoryUsage => self.memory_usage,
            ResourceClass::DiskIoBytes => self.disk_io_bytes,
            ResourceClass::DiskIoOps => self.disk_io_ops,
            ResourceClass::NetworkRxBytes => self.network_rx_bytes,
            ResourceClass::NetworkTxBytes => self.network_tx_bytes,
            ResourceClass::NetworkRxPackets => self.network_rx_packets,
            ResourceClass::NetworkTxPackets => self.network_tx_packets,
        }
    }
}

/// Time-ordered samples for one container.
///
/// An invalid series (sampling failed) never carries samples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSeries {
    pub container: String,
    pub valid: bool,
    pub samples: Vec<ContainerMetricSample>,
}

impl MetricSeries {
    pub fn valid(container: impl Into<String>, samples: Vec<ContainerMetricSample>) -> Self {
        Self {
            container: container.into(),
            valid: true,
            samples,
        }
    }

    pub fn invalid(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            valid: false,
            samples: Vec::new(),
        }
    }

    /// Raw values of one resource class, in sample order.
    pub fn values(&self, class: ResourceClass) -> Vec<f64> {
        self.samples.iter().map(|s| s.value(class) as f64).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-container series for one pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodMetricSnapshot {
    pub pod: PodName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// False when no container of this pod could be sampled.
    pub valid: bool,
    pub series: Vec<MetricSeries>,
}

impl PodMetricSnapshot {
    /// Validity flag of each container, in series order.
    pub fn container_validity(&self) -> Vec<bool> {
        self.series.iter().map(|s| s.valid).collect()
    }

    pub fn valid_series(&self) -> impl Iterator<Item = &MetricSeries> {
        self.series.iter().filter(|s| s.valid)
    }
}

/// Snapshots for every live pod of a replica group, taken from a single
/// pod listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaGroupMetricSnapshot {
    pub group: GroupName,
    /// Resource version of the group when the pod list was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    pub pods: Vec<PodMetricSnapshot>,
}

impl ReplicaGroupMetricSnapshot {
    /// Validity flag of each pod, in pod order.
    pub fn validity(&self) -> Vec<bool> {
        self.pods.iter().map(|p| p.valid).collect()
    }

    pub fn valid_pods(&self) -> impl Iterator<Item = &PodMetricSnapshot> {
        self.pods.iter().filter(|p| p.valid)
    }
}
