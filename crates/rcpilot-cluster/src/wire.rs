//! Wire types: the cluster's native JSON and the node stats JSON.
//!
//! Each type mirrors only the fields the controllers read; everything else
//! is captured in a flattened `extra` map so a read-modify-write (`PUT`)
//! sends the object back without dropping fields. Conversions into the
//! `rcpilot-core` types live here and nowhere else.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rcpilot_core::{
    ContainerMetricSample, ContainerPort, ContainerSpec, PodContainer, PodInstance, ReplicaGroup,
    ResourceRequirements, VERSION_LABEL,
};

use crate::error::ClusterError;

// ── Object metadata ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── ReplicationController ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationController {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicationControllerSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationControllerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPortSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Quantities arrive as strings (`"500m"`, `"128Mi"`) but some clients
/// send bare numbers, so values stay untyped until conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Pods ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default, rename = "hostIP")]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default, rename = "containerID")]
    pub container_id: Option<String>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub code: Option<u16>,
}

// ── Node stats ────────────────────────────────────────────────────

/// Stats endpoint response: container name → info.
pub type ContainerInfoMap = BTreeMap<String, ContainerInfo>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stats: Vec<ContainerStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStats {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cpu: CpuStats,
    #[serde(default)]
    pub memory: MemoryStats,
    #[serde(default)]
    pub diskio: DiskIoStats,
    #[serde(default)]
    pub network: NetworkStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub usage: CpuUsage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskIoStats {
    #[serde(default)]
    pub io_service_bytes: Vec<PerDiskStats>,
    #[serde(default)]
    pub io_serviced: Vec<PerDiskStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerDiskStats {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub rx_packets: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub tx_packets: u64,
}

// ── Conversions ───────────────────────────────────────────────────

impl TryFrom<ReplicationController> for ReplicaGroup {
    type Error = ClusterError;

    fn try_from(rc: ReplicationController) -> Result<Self, Self::Error> {
        let name = rc
            .metadata
            .name
            .ok_or_else(|| ClusterError::InvalidResponse("replica group without a name".into()))?;

        let template = rc.spec.template.unwrap_or_default();
        let version = rc
            .metadata
            .labels
            .get(VERSION_LABEL)
            .or_else(|| rc.spec.selector.get(VERSION_LABEL))
            .or_else(|| template.metadata.labels.get(VERSION_LABEL))
            .cloned();

        Ok(ReplicaGroup {
            name,
            namespace: rc.metadata.namespace.unwrap_or_default(),
            replicas: rc.spec.replicas.unwrap_or(0),
            selector: rc.spec.selector,
            version,
            containers: template
                .spec
                .containers
                .into_iter()
                .map(ContainerSpec::from)
                .collect(),
            resource_version: rc.metadata.resource_version,
        })
    }
}

impl From<&ReplicaGroup> for ReplicationController {
    fn from(group: &ReplicaGroup) -> Self {
        let mut labels = group.selector.clone();
        if let Some(version) = &group.version {
            labels.insert(VERSION_LABEL.to_string(), version.clone());
        }

        ReplicationController {
            api_version: Some("v1".to_string()),
            kind: Some("ReplicationController".to_string()),
            metadata: ObjectMeta {
                name: Some(group.name.clone()),
                namespace: Some(group.namespace.clone()).filter(|ns| !ns.is_empty()),
                resource_version: group.resource_version.clone(),
                labels: labels.clone(),
                ..Default::default()
            },
            spec: ReplicationControllerSpec {
                replicas: Some(group.replicas),
                selector: group.selector.clone(),
                template: Some(PodTemplateSpec {
                    metadata: ObjectMeta {
                        labels,
                        ..Default::default()
                    },
                    spec: PodSpec {
                        containers: group.containers.iter().map(Container::from).collect(),
                        extra: Map::new(),
                    },
                    extra: Map::new(),
                }),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }
}

impl From<Container> for ContainerSpec {
    fn from(c: Container) -> Self {
        let resources = c
            .resources
            .map(|r| ResourceRequirements {
                limits: quantities(r.limits),
                requests: quantities(r.requests),
            })
            .unwrap_or_default();

        ContainerSpec {
            name: c.name,
            image: c.image.unwrap_or_default(),
            ports: c
                .ports
                .into_iter()
                .map(|p| ContainerPort {
                    name: p.name,
                    container_port: p.container_port,
                    protocol: p.protocol,
                })
                .collect(),
            resources,
            // Variables sourced from secrets or fields have no literal value.
            env: c
                .env
                .into_iter()
                .filter_map(|e| e.value.map(|v| (e.name, v)))
                .collect(),
        }
    }
}

impl From<&ContainerSpec> for Container {
    fn from(c: &ContainerSpec) -> Self {
        let resources = (!c.resources.is_empty()).then(|| Resources {
            limits: c
                .resources
                .limits
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            requests: c
                .resources
                .requests
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        });

        Container {
            name: c.name.clone(),
            image: Some(c.image.clone()),
            ports: c
                .ports
                .iter()
                .map(|p| ContainerPortSpec {
                    name: p.name.clone(),
                    container_port: p.container_port,
                    protocol: p.protocol.clone(),
                    extra: Map::new(),
                })
                .collect(),
            resources,
            env: c
                .env
                .iter()
                .map(|(name, value)| EnvVar {
                    name: name.clone(),
                    value: Some(value.clone()),
                    extra: Map::new(),
                })
                .collect(),
            extra: Map::new(),
        }
    }
}

fn quantities(map: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

impl Pod {
    /// Pods that are terminating or finished no longer serve traffic.
    pub fn is_live(&self) -> bool {
        if self.metadata.deletion_timestamp.is_some() {
            return false;
        }
        !matches!(
            self.status.phase.as_deref(),
            Some("Succeeded") | Some("Failed")
        )
    }

    /// Convert to the typed view. Pods without a name are dropped.
    pub fn into_instance(self) -> Option<PodInstance> {
        let name = self.metadata.name?;
        let statuses = self.status.container_statuses;

        let containers = self
            .spec
            .containers
            .into_iter()
            .map(|c| {
                let id = statuses
                    .iter()
                    .find(|s| s.name == c.name)
                    .and_then(|s| s.container_id.as_deref())
                    .map(strip_runtime_scheme);
                PodContainer { name: c.name, id }
            })
            .collect();

        Some(PodInstance {
            name,
            generate_name: self.metadata.generate_name,
            host: self.status.host_ip,
            containers,
        })
    }
}

/// `docker://0123abcd` → `0123abcd`.
pub fn strip_runtime_scheme(id: &str) -> String {
    id.split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(id)
        .to_string()
}

impl From<&ContainerStats> for ContainerMetricSample {
    fn from(s: &ContainerStats) -> Self {
        ContainerMetricSample {
            timestamp: s.timestamp,
            cpu_usage_total: s.cpu.usage.total,
            memory_usage: s.memory.usage,
            disk_io_bytes: sum_devices(&s.diskio.io_service_bytes),
            disk_io_ops: sum_devices(&s.diskio.io_serviced),
            network_rx_bytes: s.network.rx_bytes,
            network_tx_bytes: s.network.tx_bytes,
            network_rx_packets: s.network.rx_packets,
            network_tx_packets: s.network.tx_packets,
        }
    }
}

fn sum_devices(devices: &[PerDiskStats]) -> u64 {
    devices
        .iter()
        .filter_map(|d| d.stats.get("Total"))
        .fold(0u64, |acc, v| acc.saturating_add(*v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcpilot_core::ResourceClass;

    const RC_JSON: &str = r#"{
        "kind": "ReplicationController",
        "apiVersion": "v1",
        "metadata": {
            "name": "svc-a",
            "namespace": "default",
            "resourceVersion": "4211",
            "uid": "7f3c",
            "labels": {"app": "svc-a", "version": "1"}
        },
        "spec": {
            "replicas": 3,
            "selector": {"app": "svc-a"},
            "template": {
                "metadata": {"labels": {"app": "svc-a"}},
                "spec": {
                    "containers": [{
                        "name": "app",
                        "image": "registry.local/svc-a:1",
                        "ports": [{"containerPort": 8080, "protocol": "TCP", "hostPort": 80}],
                        "resources": {"limits": {"cpu": "500m", "memory": "256Mi"}},
                        "env": [
                            {"name": "MODE", "value": "prod"},
                            {"name": "TOKEN", "valueFrom": {"secretKeyRef": {"name": "t", "key": "k"}}}
                        ],
                        "imagePullPolicy": "Always"
                    }],
                    "restartPolicy": "Always"
                }
            }
        },
        "status": {"replicas": 3, "observedGeneration": 2}
    }"#;

    #[test]
    fn decodes_replication_controller() {
        let rc: ReplicationController = serde_json::from_str(RC_JSON).unwrap();
        let group = ReplicaGroup::try_from(rc).unwrap();

        assert_eq!(group.name, "svc-a");
        assert_eq!(group.namespace, "default");
        assert_eq!(group.replicas, 3);
        assert_eq!(group.version.as_deref(), Some("1"));
        assert_eq!(group.resource_version.as_deref(), Some("4211"));

        let app = group.primary_container().unwrap();
        assert_eq!(app.image, "registry.local/svc-a:1");
        assert_eq!(app.ports[0].container_port, 8080);
        assert_eq!(app.resources.limits["cpu"], "500m");
        // Secret-backed variables have no literal value to carry over.
        assert_eq!(app.env.len(), 1);
        assert_eq!(app.env["MODE"], "prod");
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let mut rc: ReplicationController = serde_json::from_str(RC_JSON).unwrap();
        rc.spec.replicas = Some(5);
        let out = serde_json::to_value(&rc).unwrap();

        assert_eq!(out["spec"]["replicas"], 5);
        assert_eq!(out["metadata"]["uid"], "7f3c");
        assert_eq!(out["status"]["observedGeneration"], 2);
        let container = &out["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["imagePullPolicy"], "Always");
        assert_eq!(container["ports"][0]["hostPort"], 80);
        assert_eq!(container["env"][1]["valueFrom"]["secretKeyRef"]["key"], "k");
    }

    #[test]
    fn missing_name_is_invalid() {
        let rc: ReplicationController = serde_json::from_str(r#"{"spec": {"replicas": 1}}"#).unwrap();
        assert!(matches!(
            ReplicaGroup::try_from(rc),
            Err(ClusterError::InvalidResponse(_))
        ));
    }

    #[test]
    fn encodes_group_for_creation() {
        let group = ReplicaGroup {
            name: "svc-a-2".to_string(),
            namespace: "default".to_string(),
            replicas: 0,
            selector: [("app".to_string(), "svc-a".to_string())].into(),
            version: Some("2".to_string()),
            containers: vec![ContainerSpec {
                name: "app".to_string(),
                image: "registry.local/svc-a:2".to_string(),
                ..Default::default()
            }],
            resource_version: None,
        };

        let out = serde_json::to_value(ReplicationController::from(&group)).unwrap();
        assert_eq!(out["kind"], "ReplicationController");
        assert_eq!(out["spec"]["replicas"], 0);
        assert_eq!(out["metadata"]["labels"]["version"], "2");
        assert_eq!(out["spec"]["template"]["metadata"]["labels"]["version"], "2");
        assert!(out["metadata"].get("resourceVersion").is_none());
        assert!(out["spec"]["template"]["spec"]["containers"][0]
            .get("resources")
            .is_none());
    }

    #[test]
    fn decodes_pod_list() {
        let list: PodList = serde_json::from_str(
            r#"{"items": [
                {
                    "metadata": {"name": "svc-a-x1", "generateName": "svc-a-"},
                    "spec": {"containers": [{"name": "app"}, {"name": "log"}]},
                    "status": {
                        "phase": "Running",
                        "hostIP": "10.0.0.7",
                        "containerStatuses": [{"name": "app", "containerID": "docker://abc123"}]
                    }
                },
                {
                    "metadata": {"name": "svc-a-x2", "generateName": "svc-a-", "deletionTimestamp": "2024-01-01T00:00:00Z"},
                    "status": {"phase": "Running"}
                },
                {
                    "metadata": {"name": "svc-a-x3", "generateName": "svc-a-"},
                    "status": {"phase": "Failed"}
                }
            ]}"#,
        )
        .unwrap();

        let live: Vec<bool> = list.items.iter().map(Pod::is_live).collect();
        assert_eq!(live, vec![true, false, false]);

        let pod = list.items.into_iter().next().unwrap().into_instance().unwrap();
        assert_eq!(pod.host.as_deref(), Some("10.0.0.7"));
        assert_eq!(pod.containers[0].id.as_deref(), Some("abc123"));
        assert_eq!(pod.containers[1].id, None);
        assert!(pod.belongs_to("svc-a"));
    }

    #[test]
    fn converts_stats_summing_devices() {
        let info: ContainerInfoMap = serde_json::from_str(
            r#"{"/docker/abc123": {
                "name": "/docker/abc123",
                "stats": [{
                    "timestamp": "2024-05-01T10:00:00.123456789Z",
                    "cpu": {"usage": {"total": 9000, "user": 5000}},
                    "memory": {"usage": 1048576, "working_set": 900000},
                    "diskio": {
                        "io_service_bytes": [
                            {"device": "sda", "stats": {"Read": 10, "Write": 20, "Total": 30}},
                            {"device": "sdb", "stats": {"Total": 12}}
                        ],
                        "io_serviced": [{"device": "sda", "stats": {"Total": 4}}]
                    },
                    "network": {"rx_bytes": 100, "rx_packets": 2, "tx_bytes": 50, "tx_packets": 1}
                }]
            }}"#,
        )
        .unwrap();

        let stats = &info["/docker/abc123"].stats[0];
        let sample = ContainerMetricSample::from(stats);
        assert!(sample.timestamp.is_some());
        assert_eq!(sample.value(ResourceClass::CpuUsageTotal), 9000);
        assert_eq!(sample.value(ResourceClass::MemoryUsage), 1048576);
        assert_eq!(sample.value(ResourceClass::DiskIoBytes), 42);
        assert_eq!(sample.value(ResourceClass::DiskIoOps), 4);
        assert_eq!(sample.value(ResourceClass::NetworkRxBytes), 100);
        assert_eq!(sample.value(ResourceClass::NetworkTxPackets), 1);
    }

    #[test]
    fn strips_runtime_scheme() {
        assert_eq!(strip_runtime_scheme("docker://abc"), "abc");
        assert_eq!(strip_runtime_scheme("containerd://def"), "def");
        assert_eq!(strip_runtime_scheme("plain"), "plain");
    }
}
