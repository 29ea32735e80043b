/*!
 * Enforcement Gates
 *
 * One checkpoint per class of guest operation:
 * - Path jail with escape detection before any I/O syscall
 * - Import allow-list distinguishing denied from missing modules
 * - Network choke point every client style funnels through
 * - Environment projection that never leaks host state
 */

pub mod env;
pub mod module;
pub mod network;
pub mod path;

pub use env::{EnvironmentProjector, EnvironmentView};
pub use module::{ImportRequest, ImportVerdict, ModuleGate, ModuleRegistry, ModuleSpec};
pub use network::{
    ConnectVerdict, Conn, ConnectionRequest, HostPattern, NetworkGate, NetworkPolicy, Scheme,
    TcpTransport, Transport,
};
pub use path::{PathJail, PathVerdict, ResolvedPath, GUEST_ROOT};
