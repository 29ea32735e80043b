/*!
 * Denial Audit Log
 * Ordered record of denied operations, independent of guest error handling
 */

use crate::core::errors::DenialReason;
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Class of guest operation a denial belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    FileRead,
    FileWrite,
    FileDelete,
    FileList,
    DirCreate,
    Import,
    Connect,
}

/// One denied operation as observed by a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeniedOperation {
    pub kind: OperationKind,
    /// Guest-visible detail: requested path, module name, or host:port
    pub detail: String,
    pub reason: DenialReason,
}

/// Thread-safe, ordered denial record shared between the guest thread and
/// the session. Cloning shares the underlying log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<Mutex<Vec<DeniedOperation>>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one denial; called by the gates at the point of violation,
    /// before the error is raised to the guest.
    pub fn record(&self, kind: OperationKind, detail: impl Into<String>, reason: DenialReason) {
        let detail = detail.into();
        warn!("denied {:?} on {}: {}", kind, detail, reason);
        self.entries.lock().push(DeniedOperation {
            kind,
            detail,
            reason,
        });
    }

    /// Denials observed so far, in order
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeniedOperation> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
