/*!
 * Session Orchestration
 *
 * One `SandboxSession` per guest script: gates installed, environment
 * projected, guest run to completion or timeout, teardown on every exit
 * path. Denials are recorded in the audit log whether or not the guest
 * catches them.
 */

pub mod audit;
pub mod config;
pub mod guest;
pub mod manager;
pub mod session;

pub use audit::{AuditLog, DeniedOperation, OperationKind};
pub use config::SandboxConfig;
pub use guest::{Guest, GuestContext};
pub use manager::{SessionManager, SessionStats};
pub use session::{SandboxSession, SessionResult, SessionStatus};
