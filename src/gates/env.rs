/*!
 * Environment Projection
 * Builds the read-only environment the guest sees, from config alone
 *
 * The real process environment is never read or mutated; unlisted keys are
 * simply absent, so host secrets cannot leak through a lookup. The
 * guest-visible `SANDBOX_ROOT` is the guest root `/`, never the host path.
 */

use crate::core::types::ScriptType;
use crate::gates::path::GUEST_ROOT;
use crate::session::config::SandboxConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Immutable, read-only view applied once at session start
#[derive(Debug, Clone)]
pub struct EnvironmentView {
    vars: HashMap<String, String>,
    cwd: PathBuf,
    script_type: ScriptType,
}

impl EnvironmentView {
    /// Look up a guest-visible variable; unlisted keys are absent
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Guest-visible working directory (the guest root)
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[must_use]
    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Projects a `SandboxConfig` into the guest-visible environment
pub struct EnvironmentProjector;

impl EnvironmentProjector {
    #[must_use]
    pub fn project(config: &SandboxConfig) -> EnvironmentView {
        let mut vars: HashMap<String, String> = config.environment.iter().cloned().collect();

        // Synthesized keys win over config-provided values: the guest must
        // see the jail as `/` even if the host put its real path in the map
        vars.insert("SANDBOX_ROOT".to_string(), GUEST_ROOT.to_string());
        vars.insert("SCRIPT_TYPE".to_string(), config.script_type.to_string());
        vars.insert(
            config.script_type.module_path_var().to_string(),
            GUEST_ROOT.to_string(),
        );

        EnvironmentView {
            vars,
            cwd: PathBuf::from(GUEST_ROOT),
            script_type: config.script_type,
        }
    }
}
