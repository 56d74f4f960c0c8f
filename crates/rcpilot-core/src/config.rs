//! rcpilot.toml configuration parser.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Durations are written as `"500ms"`, `"30s"` or `"5m"`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::policy::ThresholdPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RcpilotConfig {
    pub cluster: ClusterConfig,
    pub sampler: SamplerConfig,
    pub rollout: RolloutConfig,
    pub autoscale: AutoscaleConfig,
}

/// Where the cluster API lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Base URL of the API server (plain HTTP, e.g. a local API proxy).
    pub api_server: String,
    pub namespace: String,
    /// Per-request timeout.
    pub timeout: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_server: "http://127.0.0.1:8080".to_string(),
            namespace: "default".to_string(),
            timeout: "10s".to_string(),
        }
    }
}

/// How container stats are read from pod hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Port of the per-node stats endpoint.
    pub port: u16,
    pub timeout: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            port: 4194,
            timeout: "5s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Wait between consecutive scaling steps.
    pub interval: String,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            interval: "10s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    /// Evaluation period.
    pub interval: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Replicas added or removed per decision.
    pub step: u32,
    pub scale_up: Option<ThresholdPolicy>,
    pub scale_down: Option<ThresholdPolicy>,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            interval: "30s".to_string(),
            min_replicas: 1,
            max_replicas: 10,
            step: 1,
            scale_up: None,
            scale_down: None,
        }
    }
}

impl RcpilotConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: RcpilotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controllers cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("cluster.timeout", &self.cluster.timeout),
            ("sampler.timeout", &self.sampler.timeout),
            ("rollout.interval", &self.rollout.interval),
            ("autoscale.interval", &self.autoscale.interval),
        ] {
            if parse_duration(value).is_none() {
                anyhow::bail!("{field}: invalid duration {value:?}");
            }
        }
        if self.autoscale.min_replicas > self.autoscale.max_replicas {
            anyhow::bail!(
                "autoscale: min_replicas ({}) exceeds max_replicas ({})",
                self.autoscale.min_replicas,
                self.autoscale.max_replicas
            );
        }
        for policy in [&self.autoscale.scale_up, &self.autoscale.scale_down]
            .into_iter()
            .flatten()
        {
            policy.validate()?;
        }
        Ok(())
    }

    pub fn cluster_timeout(&self) -> Duration {
        parse_duration(&self.cluster.timeout).unwrap_or(Duration::from_secs(10))
    }

    pub fn sampler_timeout(&self) -> Duration {
        parse_duration(&self.sampler.timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn rollout_interval(&self) -> Duration {
        parse_duration(&self.rollout.interval).unwrap_or(Duration::from_secs(10))
    }

    pub fn autoscale_interval(&self) -> Duration {
        parse_duration(&self.autoscale.interval).unwrap_or(Duration::from_secs(30))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Parse a duration string like `"250ms"`, `"30s"`, `"5m"`. A bare number
/// is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Combinator;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = RcpilotConfig::parse("").unwrap();
        assert_eq!(config.cluster.namespace, "default");
        assert_eq!(config.sampler.port, 4194);
        assert_eq!(config.rollout_interval(), Duration::from_secs(10));
        assert!(config.autoscale.scale_up.is_none());
    }

    #[test]
    fn parses_full_config() {
        let config = RcpilotConfig::parse(
            r#"
[cluster]
api_server = "http://10.0.0.1:8001"
namespace = "prod"

[rollout]
interval = "2s"

[autoscale]
interval = "1m"
min_replicas = 2
max_replicas = 6

[autoscale.scale_up]
indicator = "cpu"
direction = "above"
combinator = "any-may-breach"
required_fraction = 0.5
threshold = 800000000.0

[autoscale.scale_down]
indicator = "memory"
direction = "below"
combinator = "all-must-breach"
required_fraction = 1.0
threshold = 67108864.0
"#,
        )
        .unwrap();

        assert_eq!(config.cluster.namespace, "prod");
        assert_eq!(config.rollout_interval(), Duration::from_secs(2));
        assert_eq!(config.autoscale_interval(), Duration::from_secs(60));
        assert_eq!(config.autoscale.step, 1);
        let down = config.autoscale.scale_down.unwrap();
        assert_eq!(down.combinator, Combinator::AllMustBreach);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = RcpilotConfig::parse(
            r#"
[autoscale]
min_replicas = 5
max_replicas = 2
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds max_replicas"));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = RcpilotConfig::parse("[rollout]\ninterval = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("rollout.interval"));
    }

    #[test]
    fn rejects_invalid_policy() {
        let err = RcpilotConfig::parse(
            r#"
[autoscale.scale_up]
indicator = "cpu"
direction = "above"
combinator = "any-may-breach"
required_fraction = 2.0
threshold = 1.0
"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cluster]\nnamespace = \"staging\"").unwrap();
        let config = RcpilotConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cluster.namespace, "staging");
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("invalid"), None);
    }

    #[test]
    fn example_config_is_valid() {
        let config = RcpilotConfig::parse(include_str!("../../../rcpilot.example.toml")).unwrap();
        assert_eq!(config.autoscale.min_replicas, 2);
        let up = config.autoscale.scale_up.unwrap();
        assert_eq!(up.indicator, crate::ResourceClass::CpuUsageTotal);
        assert_eq!(up.combinator, Combinator::AnyMayBreach);
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = RcpilotConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("api_server"));
    }
}
