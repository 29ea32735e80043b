/*!
 * Module Gate
 * Import allow-list applied before any module-level code runs
 *
 * Verdicts distinguish a module that is off the allow-list (`not_allowed`)
 * from one the runtime simply does not have (`not_found`); probes assert on
 * the former specifically. Transitive dependencies declared in the registry
 * are gated with the same rule, and a denied dependency fails the whole
 * import before anything is marked loaded.
 */

use crate::core::errors::{DenialReason, SandboxError, SandboxResult};
use std::collections::{HashMap, HashSet};

/// What the runtime knows about one loadable module
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    /// Direct dependencies imported at module load time
    pub deps: Vec<String>,
}

/// Catalog of modules the guest runtime could load, with their load-time
/// dependencies. Host-supplied; the gate itself holds no runtime knowledge.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleSpec>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module with no load-time dependencies
    pub fn register(&mut self, name: &str) {
        self.modules.insert(name.to_string(), ModuleSpec::default());
    }

    /// Register a module and its direct load-time dependencies
    pub fn register_with_deps(&mut self, name: &str, deps: &[&str]) {
        self.modules.insert(
            name.to_string(),
            ModuleSpec {
                deps: deps.iter().map(|d| d.to_string()).collect(),
            },
        );
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    #[must_use]
    pub fn deps(&self, name: &str) -> Option<&[String]> {
        self.modules.get(name).map(|spec| spec.deps.as_slice())
    }
}

/// Verdict for one import attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportVerdict {
    Allowed,
    Denied { reason: DenialReason },
}

/// One import attempt and its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub module: String,
    pub verdict: ImportVerdict,
}

impl ImportRequest {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.verdict == ImportVerdict::Allowed
    }

    /// Convert the verdict into a raisable result
    pub fn into_result(self) -> SandboxResult<()> {
        match self.verdict {
            ImportVerdict::Allowed => Ok(()),
            ImportVerdict::Denied { reason } => Err(SandboxError::ModuleDenied {
                module: self.module,
                reason,
            }),
        }
    }
}

/// Gate deciding, per import attempt, whether a module may load
#[derive(Debug, Clone)]
pub struct ModuleGate {
    allowed: HashSet<String>,
    registry: ModuleRegistry,
}

/// Top-level package of a dotted module path ("json.decoder" -> "json")
fn top_level(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

impl ModuleGate {
    #[must_use]
    pub fn new(allowed: HashSet<String>, registry: ModuleRegistry) -> Self {
        Self { allowed, registry }
    }

    /// Verdict for one module name; the top-level package decides, so
    /// submodules of an allowed package need no separate listing.
    #[must_use]
    pub fn check(&self, name: &str) -> ImportRequest {
        let top = top_level(name);
        let verdict = if !self.allowed.contains(top) {
            ImportVerdict::Denied {
                reason: DenialReason::NotAllowed,
            }
        } else if !self.registry.contains(top) {
            ImportVerdict::Denied {
                reason: DenialReason::NotFound,
            }
        } else {
            ImportVerdict::Allowed
        };
        ImportRequest {
            module: name.to_string(),
            verdict,
        }
    }

    /// Gate a module and its transitive dependency closure; returns the
    /// load order (dependencies first) or the first denial.
    pub fn check_closure(&self, name: &str) -> SandboxResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        self.walk(name, &mut seen, &mut order)?;
        Ok(order)
    }

    fn walk(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> SandboxResult<()> {
        let top = top_level(name).to_string();
        if !seen.insert(top.clone()) {
            return Ok(());
        }
        self.check(name).into_result()?;
        if let Some(deps) = self.registry.deps(&top) {
            for dep in deps.to_vec() {
                self.walk(&dep, seen, order)?;
            }
        }
        order.push(top);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.register("json");
        reg.register("os");
        reg.register_with_deps("urllib", &["socket"]);
        reg.register("socket");
        reg.register_with_deps("requests", &["urllib", "json"]);
        reg
    }

    fn gate(allowed: &[&str]) -> ModuleGate {
        ModuleGate::new(
            allowed.iter().map(|s| s.to_string()).collect(),
            registry(),
        )
    }

    #[test]
    fn test_allowed_module() {
        let gate = gate(&["json"]);
        assert!(gate.check("json").is_allowed());
    }

    #[test]
    fn test_denied_is_not_allowed_not_not_found() {
        let gate = gate(&["json"]);
        let req = gate.check("requests");
        assert_eq!(
            req.verdict,
            ImportVerdict::Denied {
                reason: DenialReason::NotAllowed
            }
        );
    }

    #[test]
    fn test_missing_module_is_not_found() {
        let gate = gate(&["numpy"]);
        let req = gate.check("numpy");
        assert_eq!(
            req.verdict,
            ImportVerdict::Denied {
                reason: DenialReason::NotFound
            }
        );
    }

    #[test]
    fn test_submodule_covered_by_top_level_package() {
        let gate = gate(&["json"]);
        assert!(gate.check("json.decoder").is_allowed());
    }

    #[test]
    fn test_closure_orders_dependencies_first() {
        let gate = gate(&["urllib", "socket"]);
        let order = gate.check_closure("urllib").unwrap();
        assert_eq!(order, vec!["socket".to_string(), "urllib".to_string()]);
    }

    #[test]
    fn test_denied_transitive_dependency_fails_import() {
        // requests itself is allowed, but its urllib dependency is not
        let gate = gate(&["requests", "json"]);
        let err = gate.check_closure("requests").unwrap_err();
        assert_eq!(
            err,
            SandboxError::ModuleDenied {
                module: "urllib".to_string(),
                reason: DenialReason::NotAllowed,
            }
        );
    }
}
