/*!
 * Core Types
 * Common types used across sessions and gates
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session identifier, unique per guest invocation
pub type SessionId = Uuid;

/// Language of the guest script, exposed to the guest as `SCRIPT_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    Python,
    JavaScript,
}

impl ScriptType {
    /// Module-search-path variable the guest runtime expects
    #[must_use]
    pub const fn module_path_var(&self) -> &'static str {
        match self {
            ScriptType::Python => "PYTHONPATH",
            ScriptType::JavaScript => "NODE_PATH",
        }
    }
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ScriptType::Python => write!(f, "Python"),
            ScriptType::JavaScript => write!(f, "JavaScript"),
        }
    }
}

impl Default for ScriptType {
    fn default() -> Self {
        ScriptType::Python
    }
}
