/*!
 * Session Manager
 * Concurrent registry of session outcomes with aggregate counters
 *
 * Sessions are fully independent (gates are injected, never global), so the
 * manager only coordinates bookkeeping; any number of sessions may run at
 * once from different host threads.
 */

use crate::core::errors::SandboxResult;
use crate::core::types::SessionId;
use crate::session::config::SandboxConfig;
use crate::session::guest::Guest;
use crate::session::session::{SandboxSession, SessionResult, SessionStatus};
use dashmap::DashMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    denied_operations: AtomicU64,
}

/// Aggregate counters across all sessions run through a manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionStats {
    pub total_sessions: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub denied_operations: u64,
}

/// Host-side entry point that runs sessions and retains their results
#[derive(Clone, Default)]
pub struct SessionManager {
    results: Arc<DashMap<SessionId, SessionResult>>,
    counters: Arc<Counters>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        info!("Session manager initialized");
        Self::default()
    }

    /// Create a session from config and run the guest to completion
    pub fn run(&self, config: SandboxConfig, guest: impl Guest) -> SandboxResult<SessionResult> {
        let session = SandboxSession::new(config)?;
        Ok(self.run_session(session, guest))
    }

    /// Run a prepared session (custom registry/transport) and record it
    pub fn run_session(&self, session: SandboxSession, guest: impl Guest) -> SessionResult {
        let id = session.id();
        self.counters.started.fetch_add(1, Ordering::Relaxed);

        let result = session.run(guest);

        match result.status {
            SessionStatus::Completed => self.counters.completed.fetch_add(1, Ordering::Relaxed),
            SessionStatus::Failed => self.counters.failed.fetch_add(1, Ordering::Relaxed),
            SessionStatus::TimedOut => self.counters.timed_out.fetch_add(1, Ordering::Relaxed),
        };
        self.counters
            .denied_operations
            .fetch_add(result.denied_operations.len() as u64, Ordering::Relaxed);

        self.results.insert(id, result.clone());
        info!("Session {}: recorded ({:?})", id, result.status);
        result
    }

    /// Result of a past session, if retained
    #[must_use]
    pub fn result(&self, id: SessionId) -> Option<SessionResult> {
        self.results.get(&id).map(|r| r.clone())
    }

    /// Drop a retained result
    pub fn remove(&self, id: SessionId) -> bool {
        self.results.remove(&id).is_some()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            total_sessions: self.counters.started.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            denied_operations: self.counters.denied_operations.load(Ordering::Relaxed),
        }
    }
}
