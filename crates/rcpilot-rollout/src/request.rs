//! Rollout requests and new-group derivation.

use std::collections::BTreeMap;

use rcpilot_core::{ContainerSpec, ReplicaGroup, VERSION_LABEL};

use crate::error::{RolloutError, RolloutResult};

/// Replace `old_group` with a copy running `image` at `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutRequest {
    pub old_group: String,
    pub image: String,
    pub version: String,
    /// Environment for the new group's container. Replaces the old
    /// container's environment.
    pub env: BTreeMap<String, String>,
    /// Explicit name for the new group; derived when unset.
    pub new_name: Option<String>,
}

impl RolloutRequest {
    pub fn new(old_group: &str, image: &str, version: &str) -> Self {
        Self {
            old_group: old_group.to_string(),
            image: image.to_string(),
            version: version.to_string(),
            env: BTreeMap::new(),
            new_name: None,
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_new_name(mut self, name: &str) -> Self {
        self.new_name = Some(name.to_string());
        self
    }

    pub fn validate(&self) -> RolloutResult<()> {
        for (field, value) in [
            ("old group", &self.old_group),
            ("image", &self.image),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(RolloutError::InvalidRequest(format!("{field} must not be empty")));
            }
        }
        if matches!(&self.new_name, Some(n) if n.trim().is_empty()) {
            return Err(RolloutError::InvalidRequest("new group name must not be empty".into()));
        }
        Ok(())
    }

    /// `{base}-{version}`, where `base` is the old name without its
    /// `-{old version}` suffix.
    pub fn new_group_name(&self, old: &ReplicaGroup) -> String {
        if let Some(name) = &self.new_name {
            return name.clone();
        }
        let base = old
            .version
            .as_deref()
            .and_then(|v| old.name.strip_suffix(v))
            .and_then(|rest| rest.strip_suffix('-'))
            .filter(|base| !base.is_empty())
            .unwrap_or(&old.name);
        format!("{base}-{}", self.version)
    }

    /// Spec of the new group, created at size 0.
    ///
    /// Ports and resources come from the old group's first container; the
    /// image, version label and environment come from the request.
    pub fn build_new_group(&self, old: &ReplicaGroup) -> RolloutResult<ReplicaGroup> {
        let template = old.primary_container().ok_or_else(|| {
            RolloutError::InvalidRequest(format!("group {} has no containers", old.name))
        })?;

        let name = self.new_group_name(old);
        if name == old.name {
            return Err(RolloutError::InvalidRequest(format!(
                "new group name {name} equals the old group name"
            )));
        }

        let mut selector = old.selector.clone();
        selector.insert(VERSION_LABEL.to_string(), self.version.clone());

        Ok(ReplicaGroup {
            name,
            namespace: old.namespace.clone(),
            replicas: 0,
            selector,
            version: Some(self.version.clone()),
            containers: vec![ContainerSpec {
                name: template.name.clone(),
                image: self.image.clone(),
                ports: template.ports.clone(),
                resources: template.resources.clone(),
                env: self.env.clone(),
            }],
            resource_version: None,
        })
    }
}
