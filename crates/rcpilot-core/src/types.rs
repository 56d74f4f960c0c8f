//! Typed view of cluster resources.
//!
//! These are produced by the translation layer in `rcpilot-cluster` and
//! never carry raw JSON. A `ReplicaGroup` is a point-in-time read; callers
//! re-read it whenever freshness matters (e.g. the resource version used
//! for an update).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of a replica group (unique within its namespace).
pub type GroupName = String;

/// Name of a pod instance.
pub type PodName = String;

/// Label key carrying a replica group's version tag.
pub const VERSION_LABEL: &str = "version";

// ── Replica group ─────────────────────────────────────────────────

/// A named set of identical instances managed as one scalable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReplicaGroup {
    pub name: GroupName,
    pub namespace: String,
    /// Desired replica count.
    pub replicas: u32,
    /// Label selector matching the group's pods.
    pub selector: BTreeMap<String, String>,
    /// Version tag (the `version` label), if any.
    pub version: Option<String>,
    /// Pod template containers. The first one is the primary container.
    pub containers: Vec<ContainerSpec>,
    /// Optimistic-concurrency token from the last read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ReplicaGroup {
    /// The first container of the pod template.
    pub fn primary_container(&self) -> Option<&ContainerSpec> {
        self.containers.first()
    }

    /// `namespace/name`, used as a log and map key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// One container of a replica group's pod template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContainerSpec {
    pub name: String,
    /// Image reference (e.g. `registry/app:1.2`).
    pub image: String,
    pub ports: Vec<ContainerPort>,
    pub resources: ResourceRequirements,
    /// Environment variables with literal values.
    pub env: BTreeMap<String, String>,
}

/// A port exposed by a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Resource limits and requests, keyed by resource name (`cpu`, `memory`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

impl ResourceRequirements {
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }
}

// ── Pod ───────────────────────────────────────────────────────────

/// A running instance belonging to a replica group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PodInstance {
    pub name: PodName,
    /// Generated-name prefix assigned by the owning group (`"{group}-"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    /// Address of the node hosting the pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub containers: Vec<PodContainer>,
}

/// A container inside a running pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PodContainer {
    pub name: String,
    /// Runtime container id (scheme prefix stripped), once started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PodInstance {
    /// Whether this pod belongs to `group`: either its generated-name
    /// prefix is `"{group}-"` or its name is exactly `group`.
    ///
    /// A bare name-prefix match is not enough: pods of `svc-a-2` would
    /// otherwise be attributed to `svc-a`.
    pub fn belongs_to(&self, group: &str) -> bool {
        if self.name == group {
            return true;
        }
        match &self.generate_name {
            Some(prefix) => prefix.strip_suffix('-') == Some(group),
            None => false,
        }
    }

    /// Look up a container by name.
    pub fn container(&self, name: &str) -> Option<&PodContainer> {
        self.containers.iter().find(|c| c.name == name)
    }
}
