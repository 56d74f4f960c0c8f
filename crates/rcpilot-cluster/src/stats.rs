//! `MetricSampler` reading per-container stats from the pod's node.
//!
//! The node agent keeps a short rolling window of samples per container;
//! one request returns the whole window, oldest first.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use rcpilot_core::{ContainerMetricSample, MetricSeries, PodInstance};

use crate::client::MetricSampler;
use crate::error::{ClusterError, ClusterResult};
use crate::transport::HttpTransport;
use crate::wire::ContainerInfoMap;

/// Reads `http://{host}:{port}/api/v1.3/docker/{container_id}`.
#[derive(Debug, Clone)]
pub struct HttpMetricSampler {
    port: u16,
    transport: HttpTransport,
}

impl HttpMetricSampler {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            transport: HttpTransport::new(timeout),
        }
    }
}

#[async_trait]
impl MetricSampler for HttpMetricSampler {
    async fn sample_container(
        &self,
        pod: &PodInstance,
        container: &str,
    ) -> ClusterResult<MetricSeries> {
        let host = pod
            .host
            .as_deref()
            .ok_or_else(|| ClusterError::sampling(&pod.name, container, "pod has no host address"))?;
        let id = pod
            .container(container)
            .and_then(|c| c.id.as_deref())
            .ok_or_else(|| ClusterError::sampling(&pod.name, container, "container not started"))?;

        let url = format!("http://{host}:{}/api/v1.3/docker/{id}", self.port);
        let infos: ContainerInfoMap = self
            .transport
            .get(&url)
            .await
            .and_then(|resp| resp.json(id))
            .map_err(|e| ClusterError::sampling(&pod.name, container, e.to_string()))?;

        // The response is keyed by the runtime's container path; a lookup by
        // id returns exactly one entry.
        let info = infos
            .into_values()
            .next()
            .ok_or_else(|| ClusterError::sampling(&pod.name, container, "empty stats response"))?;

        let mut stats = info.stats;
        stats.sort_by_key(|s| s.timestamp);
        let samples: Vec<ContainerMetricSample> =
            stats.iter().map(ContainerMetricSample::from).collect();

        debug!(pod = %pod.name, container, samples = samples.len(), "sampled container");
        Ok(MetricSeries::valid(container, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcpilot_core::{PodContainer, ResourceClass};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn pod(host: Option<&str>, id: Option<&str>) -> PodInstance {
        PodInstance {
            name: "svc-a-x1".to_string(),
            generate_name: Some("svc-a-".to_string()),
            host: host.map(str::to_string),
            containers: vec![PodContainer {
                name: "app".to_string(),
                id: id.map(str::to_string),
            }],
        }
    }

    #[tokio::test]
    async fn missing_host_is_a_sampling_error() {
        let sampler = HttpMetricSampler::new(4194, Duration::from_secs(1));
        let err = sampler
            .sample_container(&pod(None, Some("abc")), "app")
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Sampling { .. }));
    }

    #[tokio::test]
    async fn unstarted_container_is_a_sampling_error() {
        let sampler = HttpMetricSampler::new(4194, Duration::from_secs(1));
        let err = sampler
            .sample_container(&pod(Some("127.0.0.1"), None), "app")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("container not started"));
    }

    #[tokio::test]
    async fn reads_samples_in_time_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..n]).to_string();
            assert!(head.starts_with("GET /api/v1.3/docker/abc "));

            let body = r#"{"/docker/abc": {"stats": [
                {"timestamp": "2024-05-01T10:00:02Z", "cpu": {"usage": {"total": 300}}},
                {"timestamp": "2024-05-01T10:00:01Z", "cpu": {"usage": {"total": 100}}}
            ]}}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });

        let sampler = HttpMetricSampler::new(port, Duration::from_secs(5));
        let series = sampler
            .sample_container(&pod(Some("127.0.0.1"), Some("abc")), "app")
            .await
            .unwrap();

        assert!(series.valid);
        assert_eq!(series.values(ResourceClass::CpuUsageTotal), vec![100.0, 300.0]);
    }
}
