/*!
 * Guest Execution Adapter
 *
 * `GuestContext` is the only handle a guest gets: every filesystem, import,
 * and network operation goes through the session's gates, and printed output
 * is captured for the host. The context holds no ambient authority; gates
 * are injected per session, so concurrent sessions cannot interfere.
 */

use crate::core::errors::{DenialReason, SandboxError, SandboxResult};
use crate::gates::env::EnvironmentView;
use crate::gates::module::ModuleGate;
use crate::gates::network::{Conn, ConnectVerdict, NetworkGate, Scheme, Transport};
use crate::gates::path::PathJail;
use crate::session::audit::{AuditLog, OperationKind};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Guest-execution adapter: the confined script, expressed as code that only
/// ever touches the world through the provided context.
pub trait Guest: Send + 'static {
    fn run(&self, ctx: &GuestContext) -> SandboxResult<()>;
}

impl<F> Guest for F
where
    F: Fn(&GuestContext) -> SandboxResult<()> + Send + 'static,
{
    fn run(&self, ctx: &GuestContext) -> SandboxResult<()> {
        self(ctx)
    }
}

/// Mediated view of the world handed to a guest for one session
pub struct GuestContext {
    jail: Arc<PathJail>,
    modules: Arc<ModuleGate>,
    network: Arc<NetworkGate>,
    env: Arc<EnvironmentView>,
    transport: Arc<dyn Transport>,
    audit: AuditLog,
    stdout: Arc<Mutex<String>>,
    loaded: Mutex<HashSet<String>>,
    revoked: Arc<AtomicBool>,
}

impl GuestContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        jail: Arc<PathJail>,
        modules: Arc<ModuleGate>,
        network: Arc<NetworkGate>,
        env: Arc<EnvironmentView>,
        transport: Arc<dyn Transport>,
        audit: AuditLog,
        stdout: Arc<Mutex<String>>,
        revoked: Arc<AtomicBool>,
    ) -> Self {
        Self {
            jail,
            modules,
            network,
            env,
            transport,
            audit,
            stdout,
            loaded: Mutex::new(HashSet::new()),
            revoked,
        }
    }

    /// All mediated operations fail once the session revoked its gates
    fn guard(&self) -> SandboxResult<()> {
        if self.revoked.load(Ordering::SeqCst) {
            Err(SandboxError::SessionTerminated)
        } else {
            Ok(())
        }
    }

    /// Jail a guest path or record the escape and raise, before any I/O
    fn jailed(&self, kind: OperationKind, path: &Path) -> SandboxResult<PathBuf> {
        let resolved = self.jail.resolve(path);
        match resolved.host_path() {
            Some(host) => Ok(host.to_path_buf()),
            None => {
                let requested = path.display().to_string();
                self.audit
                    .record(kind, requested.clone(), DenialReason::Escape);
                Err(SandboxError::PathEscape { requested })
            }
        }
    }

    // --- filesystem ---

    pub fn write_file(&self, path: impl AsRef<Path>, contents: &[u8]) -> SandboxResult<()> {
        self.guard()?;
        let host = self.jailed(OperationKind::FileWrite, path.as_ref())?;
        std::fs::write(host, contents)?;
        Ok(())
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> SandboxResult<Vec<u8>> {
        self.guard()?;
        let host = self.jailed(OperationKind::FileRead, path.as_ref())?;
        Ok(std::fs::read(host)?)
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> SandboxResult<String> {
        self.guard()?;
        let host = self.jailed(OperationKind::FileRead, path.as_ref())?;
        Ok(std::fs::read_to_string(host)?)
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> SandboxResult<()> {
        self.guard()?;
        let host = self.jailed(OperationKind::FileDelete, path.as_ref())?;
        std::fs::remove_file(host)?;
        Ok(())
    }

    /// Entry names (not host paths) of a jailed directory
    pub fn list_dir(&self, path: impl AsRef<Path>) -> SandboxResult<Vec<String>> {
        self.guard()?;
        let host = self.jailed(OperationKind::FileList, path.as_ref())?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(host)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> SandboxResult<()> {
        self.guard()?;
        let host = self.jailed(OperationKind::DirCreate, path.as_ref())?;
        std::fs::create_dir_all(host)?;
        Ok(())
    }

    // --- imports ---

    /// Import a module and its registry-declared dependency closure. A
    /// denied dependency fails the whole import and leaves the loaded set
    /// untouched, so no module-level side effects can have happened.
    pub fn import(&self, module: &str) -> SandboxResult<()> {
        self.guard()?;
        {
            let loaded = self.loaded.lock();
            if loaded.contains(module) {
                return Ok(());
            }
        }
        match self.modules.check_closure(module) {
            Ok(order) => {
                self.loaded.lock().extend(order);
                Ok(())
            }
            Err(err) => {
                if let SandboxError::ModuleDenied { module, reason } = &err {
                    self.audit
                        .record(OperationKind::Import, module.clone(), *reason);
                }
                Err(err)
            }
        }
    }

    /// Whether a module was loaded during this session
    #[must_use]
    pub fn is_loaded(&self, module: &str) -> bool {
        self.loaded.lock().contains(module)
    }

    // --- network ---

    /// Dial an approved target. The gate verdict comes first: a denial is
    /// recorded and raised before the transport (and thus DNS) is touched.
    pub fn connect(&self, host: &str, port: u16, scheme: Scheme) -> SandboxResult<Box<dyn Conn>> {
        self.guard()?;
        let request = self.network.check(host, port, scheme);
        if let ConnectVerdict::Denied { reason } = request.verdict {
            let target = request.target();
            self.audit
                .record(OperationKind::Connect, target.clone(), reason);
            return Err(SandboxError::NetworkDenied { target, reason });
        }
        Ok(self.transport.connect(host, port)?)
    }

    /// Minimal HTTP GET funneled through `connect`; demonstrates that a
    /// higher-level client style cannot bypass the choke point.
    pub fn http_get(&self, url: &str) -> SandboxResult<String> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| SandboxError::Guest(format!("malformed url: {url}")))?;
        let scheme = Scheme::parse(scheme)?;
        let (authority, path) = match rest.split_once('/') {
            Some((authority, tail)) => (authority, format!("/{tail}")),
            None => (rest, "/".to_string()),
        };
        let (host, port) = split_authority(authority, scheme.default_port())
            .ok_or_else(|| SandboxError::Guest(format!("malformed url: {url}")))?;

        let mut conn = self.connect(host, port, scheme)?;
        write!(
            conn,
            "GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n"
        )
        .map_err(SandboxError::from)?;
        let mut response = String::new();
        conn.read_to_string(&mut response)?;
        Ok(response)
    }

    // --- environment ---

    /// Guest-visible variable lookup; unlisted keys are absent, never a
    /// host value
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key)
    }

    /// Guest-visible working directory (always the guest root)
    #[must_use]
    pub fn cwd(&self) -> &Path {
        self.env.cwd()
    }

    // --- output ---

    /// Captured stdout line, collected into the session result
    pub fn println(&self, line: impl AsRef<str>) {
        let mut out = self.stdout.lock();
        out.push_str(line.as_ref());
        out.push('\n');
    }
}

/// Split a URL authority into host and port. IPv6 literals are bracketed
/// (`[::1]:8080`); the brackets delimit the host so its colons are not
/// mistaken for a port separator.
fn split_authority(authority: &str, default_port: u16) -> Option<(&str, u16)> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None if tail.is_empty() => default_port,
            None => return None,
        };
        return Some((host, port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host, port.parse().ok()?)),
        None => Some((authority, default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_authority_host_and_port() {
        assert_eq!(split_authority("example.com:8080", 80), Some(("example.com", 8080)));
        assert_eq!(split_authority("example.com", 80), Some(("example.com", 80)));
    }

    #[test]
    fn test_split_authority_ipv6_literal() {
        assert_eq!(split_authority("[::1]:8080", 80), Some(("::1", 8080)));
        assert_eq!(split_authority("[::1]", 80), Some(("::1", 80)));
        assert_eq!(split_authority("[2001:db8::1]:443", 80), Some(("2001:db8::1", 443)));
    }

    #[test]
    fn test_split_authority_rejects_malformed() {
        assert_eq!(split_authority("[::1", 80), None);
        assert_eq!(split_authority("[::1]8080", 80), None);
        assert_eq!(split_authority("example.com:notaport", 80), None);
    }
}
