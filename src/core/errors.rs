/*!
 * Error Taxonomy
 * Typed denials raised at the point of violation, plus session-level faults
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sandbox operation result
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Why a guest operation was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Requested name/target is not on the allow-list
    NotAllowed,
    /// Module is allowed but the runtime has no such module
    NotFound,
    /// Path resolves outside the jail root
    Escape,
    /// Network policy denies all targets
    DenyAll,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DenialReason::NotAllowed => write!(f, "not_allowed"),
            DenialReason::NotFound => write!(f, "not_found"),
            DenialReason::Escape => write!(f, "escape"),
            DenialReason::DenyAll => write!(f, "deny_all"),
        }
    }
}

/// Unified sandbox error type
///
/// Gate denials propagate through guest code as ordinary errors (the guest
/// may catch them); the session records each denial independently.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum SandboxError {
    #[error("path escapes sandbox root: {requested}")]
    PathEscape { requested: String },

    #[error("import of '{module}' denied: {reason}")]
    ModuleDenied {
        module: String,
        reason: DenialReason,
    },

    #[error("connection to {target} denied: {reason}")]
    NetworkDenied {
        target: String,
        reason: DenialReason,
    },

    #[error("session exceeded time budget of {budget_ms} ms")]
    Timeout { budget_ms: u64 },

    #[error("session already terminated")]
    SessionTerminated,

    #[error("guest error: {0}")]
    Guest(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        SandboxError::Io(err.to_string())
    }
}

impl SandboxError {
    /// Reason carried by a denial variant, if this is one
    #[must_use]
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            SandboxError::PathEscape { .. } => Some(DenialReason::Escape),
            SandboxError::ModuleDenied { reason, .. } => Some(*reason),
            SandboxError::NetworkDenied { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
