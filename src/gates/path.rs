/*!
 * Path Jail
 * Re-anchors guest paths at the jail root and rejects escapes before I/O
 *
 * Guest `/` means the jail root, never the host root. Escape detection is
 * lexical first (a `..` that climbs above the guest root is a verdict, not a
 * filesystem error), then symlink-aware: the candidate is canonicalized
 * against the host filesystem and must stay under the root.
 */

use crate::core::errors::{SandboxError, SandboxResult};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// The root path as the guest sees it
pub const GUEST_ROOT: &str = "/";

/// Verdict for one resolved guest path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathVerdict {
    /// Canonical path is the root or a descendant of it
    Inside,
    /// Canonical path falls outside the jail root
    Escaped,
}

/// Result of jailing one requested path
///
/// Escaped verdicts never reach the real filesystem: `host_path` returns
/// `None` for them, so callers cannot dispatch the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    requested: PathBuf,
    canonical: Option<PathBuf>,
    verdict: PathVerdict,
}

impl ResolvedPath {
    #[must_use]
    pub fn verdict(&self) -> PathVerdict {
        self.verdict
    }

    #[must_use]
    pub fn is_inside(&self) -> bool {
        self.verdict == PathVerdict::Inside
    }

    /// The path as the guest requested it
    #[must_use]
    pub fn requested(&self) -> &Path {
        &self.requested
    }

    /// Host path to dispatch the operation on; `None` when escaped
    #[must_use]
    pub fn host_path(&self) -> Option<&Path> {
        match self.verdict {
            PathVerdict::Inside => self.canonical.as_deref(),
            PathVerdict::Escaped => None,
        }
    }
}

/// Jail that confines all guest-visible paths to one host directory
#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
}

impl PathJail {
    /// Create a jail over an existing directory; the root is canonicalized
    /// once so later containment checks compare canonical forms only.
    pub fn new(root: &Path) -> SandboxResult<Self> {
        let root = root.canonicalize().map_err(|e| {
            SandboxError::InvalidConfig(format!("jail root {}: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(SandboxError::InvalidConfig(format!(
                "jail root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Canonical host path of the jail root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a guest-requested path against the jail root.
    ///
    /// Relative paths are joined to the root (the guest cwd is `/`);
    /// absolute paths are re-anchored at the root. `.` and `..` collapse
    /// lexically, and a `..` above the guest root escapes. Symlinks are then
    /// resolved and the canonical result must stay under the root.
    #[must_use]
    pub fn resolve(&self, requested: &Path) -> ResolvedPath {
        let mut stack: Vec<OsString> = Vec::new();
        for comp in requested.components() {
            match comp {
                Component::RootDir | Component::Prefix(_) => stack.clear(),
                Component::CurDir => {}
                Component::ParentDir => {
                    if stack.pop().is_none() {
                        // Climbed above the guest root
                        return ResolvedPath {
                            requested: requested.to_path_buf(),
                            canonical: None,
                            verdict: PathVerdict::Escaped,
                        };
                    }
                }
                Component::Normal(part) => stack.push(part.to_os_string()),
            }
        }

        let mut candidate = self.root.clone();
        for part in &stack {
            candidate.push(part);
        }

        let canonical = resolve_existing(&candidate);
        let verdict = if canonical.starts_with(&self.root) {
            PathVerdict::Inside
        } else {
            PathVerdict::Escaped
        };

        ResolvedPath {
            requested: requested.to_path_buf(),
            canonical: Some(canonical),
            verdict,
        }
    }

    /// Resolve and raise `PathEscape` on any escaped verdict.
    pub fn require_inside(&self, requested: &Path) -> SandboxResult<PathBuf> {
        let resolved = self.resolve(requested);
        match resolved.host_path() {
            Some(host) => Ok(host.to_path_buf()),
            None => Err(SandboxError::PathEscape {
                requested: requested.display().to_string(),
            }),
        }
    }
}

/// Canonicalize with fallback for not-yet-existing targets: the deepest
/// existing ancestor is canonicalized (resolving its symlinks) and the
/// remaining components are re-checked one at a time.
fn resolve_existing(path: &Path) -> PathBuf {
    resolve_limited(path, 0)
}

/// Symlink chain budget for manual expansion; past it the path is returned
/// as-is and real I/O reports the loop
const MAX_LINK_DEPTH: u8 = 8;

fn resolve_limited(path: &Path, depth: u8) -> PathBuf {
    if depth >= MAX_LINK_DEPTH {
        return path.to_path_buf();
    }
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    // Deepest existing ancestor, canonicalized
    let mut remainder: Vec<OsString> = Vec::new();
    let mut cur = path;
    let base = loop {
        let Some(parent) = cur.parent() else {
            return path.to_path_buf();
        };
        if let Some(name) = cur.file_name() {
            remainder.push(name.to_os_string());
        }
        if let Ok(canonical) = parent.canonicalize() {
            break canonical;
        }
        cur = parent;
    };

    // A dangling symlink does not canonicalize but still redirects the
    // operation, so appended components must have their link targets
    // resolved and checked like any other path.
    let mut out = base;
    for (i, part) in remainder.iter().rev().enumerate() {
        out.push(part);
        let is_link = out
            .symlink_metadata()
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link {
            continue;
        }
        let Ok(target) = out.read_link() else {
            continue;
        };
        let mut redirected = if target.is_absolute() {
            target
        } else {
            match out.parent() {
                Some(parent) => parent.join(target),
                None => target,
            }
        };
        for rest in remainder.iter().rev().skip(i + 1) {
            redirected.push(rest);
        }
        return resolve_limited(&redirected, depth + 1);
    }
    out
}
