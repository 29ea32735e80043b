/*!
 * Scriptbox
 * Sandbox enforcement layer for untrusted interpreted guest scripts
 *
 * One session confines one guest script: filesystem access is jailed to a
 * configured root, imports are filtered by an allow-list, outbound
 * connections are mediated at a single transport choke point, and the guest
 * sees a curated environment instead of the host's. Gates are injected into
 * the guest-execution adapter per session; no interpreter-global state.
 */

pub mod core;
pub mod gates;
pub mod session;

// Re-exports
pub use crate::core::errors::{DenialReason, SandboxError, SandboxResult};
pub use crate::core::types::{ScriptType, SessionId};
pub use crate::gates::{
    Conn, ConnectionRequest, EnvironmentProjector, EnvironmentView, HostPattern, ImportRequest,
    ModuleGate, ModuleRegistry, NetworkGate, NetworkPolicy, PathJail, PathVerdict, ResolvedPath,
    Scheme, TcpTransport, Transport,
};
pub use crate::session::{
    AuditLog, DeniedOperation, Guest, GuestContext, OperationKind, SandboxConfig, SandboxSession,
    SessionManager, SessionResult, SessionStats, SessionStatus,
};
