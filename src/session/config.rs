/*!
 * Session Configuration
 */

use crate::core::errors::{SandboxError, SandboxResult};
use crate::core::types::ScriptType;
use crate::gates::network::NetworkPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Host-side configuration for one session, immutable once the session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    /// Host directory all guest paths are confined to
    pub root: PathBuf,
    /// Top-level module names the guest may import
    #[serde(skip_serializing_if = "HashSet::is_empty", default)]
    pub allowed_modules: HashSet<String>,
    /// Outbound connection policy
    #[serde(default)]
    pub network_policy: NetworkPolicy,
    /// Variables projected into the guest environment
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub environment: Vec<(String, String)>,
    /// Wall-clock budget for the guest run
    pub timeout: Duration,
    /// Guest language tag
    #[serde(default)]
    pub script_type: ScriptType,
    /// Remove session files under root during teardown
    #[serde(default)]
    pub clean_root_on_teardown: bool,
}

impl SandboxConfig {
    /// Most restrictive configuration: no modules, no network, empty
    /// environment, default timeout.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allowed_modules: HashSet::new(),
            network_policy: NetworkPolicy::DenyAll,
            environment: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            script_type: ScriptType::default(),
            clean_root_on_teardown: false,
        }
    }

    #[must_use]
    pub fn with_module(mut self, name: &str) -> Self {
        self.allowed_modules.insert(name.to_string());
        self
    }

    #[must_use]
    pub fn with_modules(mut self, names: &[&str]) -> Self {
        self.allowed_modules
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    #[must_use]
    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.network_policy = policy;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.environment.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_script_type(mut self, script_type: ScriptType) -> Self {
        self.script_type = script_type;
        self
    }

    #[must_use]
    pub fn with_clean_root(mut self, clean: bool) -> Self {
        self.clean_root_on_teardown = clean;
        self
    }

    /// Reject configurations that cannot confine anything
    pub fn validate(&self) -> SandboxResult<()> {
        if !self.root.exists() {
            return Err(SandboxError::InvalidConfig(format!(
                "root {} does not exist",
                self.root.display()
            )));
        }
        if !self.root.is_dir() {
            return Err(SandboxError::InvalidConfig(format!(
                "root {} is not a directory",
                self.root.display()
            )));
        }
        if self.timeout.is_zero() {
            return Err(SandboxError::InvalidConfig(
                "timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
