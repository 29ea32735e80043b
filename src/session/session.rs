/*!
 * Sandbox Session
 * One confined guest execution: Created -> Running -> terminal -> TornDown
 *
 * The guest runs on its own thread; the session waits with the configured
 * time budget. Teardown revokes the shared gate state exactly once on every
 * exit path, including host-side faults (a drop guard backs the explicit
 * call). An orphaned guest left behind by a timeout keeps its context, but
 * every further mediated operation fails with `SessionTerminated`.
 */

use crate::core::errors::{SandboxError, SandboxResult};
use crate::core::types::SessionId;
use crate::gates::env::EnvironmentProjector;
use crate::gates::module::{ModuleGate, ModuleRegistry};
use crate::gates::network::{NetworkGate, TcpTransport, Transport};
use crate::gates::path::PathJail;
use crate::session::audit::{AuditLog, DeniedOperation};
use crate::session::config::SandboxConfig;
use crate::session::guest::{Guest, GuestContext};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

/// Terminal status of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Guest returned normally
    Completed,
    /// Guest raised an unhandled error (including uncaught gate denials)
    Failed,
    /// Guest exceeded the configured time budget
    TimedOut,
}

/// Outcome of one session, owned by the host caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionResult {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Captured guest stdout
    pub stdout: String,
    /// Error detail for failed or timed-out sessions
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Ordered denials observed by the gates, independent of guest catching
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub denied_operations: Vec<DeniedOperation>,
}

/// Revokes gate state and cleans root-scoped files, exactly once.
/// Dropping fires it too, so a host-side fault cannot leak installed gates.
struct Teardown {
    session_id: SessionId,
    revoked: Arc<AtomicBool>,
    fired: AtomicBool,
    clean_root: Option<std::path::PathBuf>,
}

impl Teardown {
    fn run(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.revoked.store(true, Ordering::SeqCst);
        if let Some(root) = &self.clean_root {
            if let Err(e) = clean_dir(root) {
                warn!("Session {}: root cleanup failed: {}", self.session_id, e);
            }
        }
        info!("Session {}: TornDown", self.session_id);
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}

/// Remove every entry under a directory, keeping the directory itself
fn clean_dir(root: &std::path::Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// One confined execution of a single guest script
pub struct SandboxSession {
    id: SessionId,
    config: SandboxConfig,
    registry: ModuleRegistry,
    transport: Arc<dyn Transport>,
}

impl SandboxSession {
    /// Validate the config and prepare a session in the Created state
    pub fn new(config: SandboxConfig) -> SandboxResult<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        info!("Session {}: Created (root {})", id, config.root.display());
        Ok(Self {
            id,
            config,
            registry: ModuleRegistry::new(),
            transport: Arc::new(TcpTransport),
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Catalog of modules the guest runtime could load
    #[must_use]
    pub fn with_module_registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the dial primitive (tests inject a recorder; hosts inject a
    /// TLS-capable transport where guests need https)
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Run the guest to a terminal state and tear down. Consumes the
    /// session: gates live exactly as long as the run.
    pub fn run(self, guest: impl Guest) -> SessionResult {
        let Self {
            id,
            config,
            registry,
            transport,
        } = self;

        let revoked = Arc::new(AtomicBool::new(false));
        let audit = AuditLog::new();
        let stdout = Arc::new(Mutex::new(String::new()));

        let jail = match PathJail::new(&config.root) {
            Ok(jail) => Arc::new(jail),
            Err(err) => {
                // Root vanished between validate and run
                return SessionResult {
                    session_id: id,
                    status: SessionStatus::Failed,
                    stdout: String::new(),
                    error: Some(err.to_string()),
                    denied_operations: Vec::new(),
                };
            }
        };

        let teardown = Teardown {
            session_id: id,
            revoked: Arc::clone(&revoked),
            fired: AtomicBool::new(false),
            clean_root: config
                .clean_root_on_teardown
                .then(|| jail.root().to_path_buf()),
        };

        let ctx = GuestContext::new(
            jail,
            Arc::new(ModuleGate::new(config.allowed_modules.clone(), registry)),
            Arc::new(NetworkGate::new(config.network_policy.clone())),
            Arc::new(EnvironmentProjector::project(&config)),
            transport,
            audit.clone(),
            Arc::clone(&stdout),
            Arc::clone(&revoked),
        );

        info!("Session {}: Running", id);
        let (tx, rx) = flume::bounded(1);
        let spawned = thread::Builder::new()
            .name(format!("guest-{id}"))
            .spawn(move || {
                let _ = tx.send(guest.run(&ctx));
            });

        let (status, error, join) = match spawned {
            Err(e) => (
                SessionStatus::Failed,
                Some(format!("failed to start guest: {e}")),
                None,
            ),
            Ok(handle) => match rx.recv_timeout(config.timeout) {
                Ok(Ok(())) => (SessionStatus::Completed, None, Some(handle)),
                Ok(Err(err)) => (SessionStatus::Failed, Some(err.to_string()), Some(handle)),
                Err(flume::RecvTimeoutError::Timeout) => {
                    warn!("Session {}: TimedOut after {:?}", id, config.timeout);
                    let err = SandboxError::Timeout {
                        budget_ms: config.timeout.as_millis() as u64,
                    };
                    // Guest thread is abandoned; its next gate check fails
                    (SessionStatus::TimedOut, Some(err.to_string()), None)
                }
                Err(flume::RecvTimeoutError::Disconnected) => (
                    SessionStatus::Failed,
                    Some("guest panicked".to_string()),
                    Some(handle),
                ),
            },
        };

        info!("Session {}: {:?}", id, status);
        teardown.run();

        if let Some(handle) = join {
            let _ = handle.join();
        }

        let stdout = stdout.lock().clone();
        SessionResult {
            session_id: id,
            status,
            stdout,
            error,
            denied_operations: audit.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_teardown_runs_exactly_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let revoked = Arc::new(AtomicBool::new(false));
        let teardown = Teardown {
            session_id: Uuid::new_v4(),
            revoked: Arc::clone(&revoked),
            fired: AtomicBool::new(false),
            clean_root: Some(dir.path().to_path_buf()),
        };

        teardown.run();
        assert!(revoked.load(Ordering::SeqCst));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Second run is a no-op: a file created afterwards survives
        std::fs::write(dir.path().join("b.txt"), b"y").unwrap();
        teardown.run();
        drop(teardown);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_teardown_fires_on_drop() {
        let revoked = Arc::new(AtomicBool::new(false));
        let teardown = Teardown {
            session_id: Uuid::new_v4(),
            revoked: Arc::clone(&revoked),
            fired: AtomicBool::new(false),
            clean_root: None,
        };
        drop(teardown);
        assert!(revoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_session_rejects_invalid_config() {
        let config = SandboxConfig::new("/nonexistent/sandbox/root");
        assert!(SandboxSession::new(config).is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
    }
}
