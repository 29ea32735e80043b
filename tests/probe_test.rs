/*!
 * Probe-Style Guest Tests
 * Guests modeled on real sandbox probe scripts: print-heavy, catch-and-report
 */

mod common;

use common::{init_logging, MockTransport};
use pretty_assertions::assert_eq;
use scriptbox::{
    DenialReason, GuestContext, ModuleRegistry, OperationKind, SandboxConfig, SandboxSession,
    Scheme, SessionStatus,
};
use std::sync::Arc;
use tempfile::TempDir;

fn probe_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register("json");
    registry.register("socket");
    registry.register_with_deps("urllib", &["socket"]);
    registry
}

/// Environment probe: reports variables, exercises file create/read/delete,
/// attempts an escape, loads its allowed modules. Every violation is caught
/// and printed; the session must still complete and still audit the escape.
#[test]
fn test_env_probe() {
    init_logging();
    let root = TempDir::new().unwrap();

    let config = SandboxConfig::new(root.path())
        .with_env("APP_ENV", "production")
        .with_env("CUSTOM_VAR", "custom_value")
        .with_env("SERVER_ID", "server-1")
        .with_modules(&["json", "urllib", "socket"]);

    let result = SandboxSession::new(config)
        .unwrap()
        .with_module_registry(probe_registry())
        .run(|ctx: &GuestContext| {
            for key in ["APP_ENV", "CUSTOM_VAR", "SERVER_ID", "SANDBOX_ROOT", "SCRIPT_TYPE"] {
                ctx.println(format!("- {}: {}", key, ctx.env(key).unwrap_or("(unset)")));
            }
            ctx.println(format!("- CWD: {}", ctx.cwd().display()));
            ctx.println(format!("- PYTHONPATH: {}", ctx.env("PYTHONPATH").unwrap()));

            ctx.write_file("/test.txt", b"Test de fichier")?;
            ctx.println("file created");
            ctx.println(ctx.read_to_string("/test.txt")?);

            match ctx.read_file("/../hors_sandbox.txt") {
                Ok(_) => ctx.println("unauthorized access succeeded"),
                Err(e) => ctx.println(format!("escape blocked: {e}")),
            }

            ctx.remove_file("/test.txt")?;
            ctx.println("file removed");

            ctx.import("json")?;
            ctx.println("json loaded");
            ctx.import("urllib")?;
            ctx.println("urllib loaded");
            Ok(())
        });

    assert_eq!(result.status, SessionStatus::Completed);
    assert!(result.stdout.contains("- APP_ENV: production"));
    assert!(result.stdout.contains("- CUSTOM_VAR: custom_value"));
    assert!(result.stdout.contains("- SERVER_ID: server-1"));
    assert!(result.stdout.contains("- SANDBOX_ROOT: /"));
    assert!(result.stdout.contains("- SCRIPT_TYPE: Python"));
    assert!(result.stdout.contains("- CWD: /"));
    assert!(result.stdout.contains("- PYTHONPATH: /"));
    assert!(result.stdout.contains("escape blocked"));
    assert!(result.stdout.contains("json loaded"));
    assert!(result.stdout.contains("urllib loaded"));

    // The probe deleted its own file; nothing left behind
    assert!(!root.path().join("test.txt").exists());

    assert_eq!(result.denied_operations.len(), 1);
    assert_eq!(result.denied_operations[0].reason, DenialReason::Escape);
}

/// HTTP probe under deny-all: two different client styles (raw connect and
/// the GET helper) must fail identically at the same choke point, with no
/// dial ever reaching the transport.
#[test]
fn test_http_probe_deny_all() {
    init_logging();
    let root = TempDir::new().unwrap();
    let transport = MockTransport::new();

    let result = SandboxSession::new(SandboxConfig::new(root.path()))
        .unwrap()
        .with_transport(Arc::new(transport.clone()))
        .run(|ctx: &GuestContext| {
            match ctx.http_get("http://example.com") {
                Ok(_) => ctx.println("urllib-style GET succeeded"),
                Err(e) => ctx.println(format!("urllib-style blocked: {e}")),
            }
            match ctx.connect("api.github.com", 443, Scheme::Https) {
                Ok(_) => ctx.println("http.client-style connect succeeded"),
                Err(e) => ctx.println(format!("http.client-style blocked: {e}")),
            }
            Ok(())
        });

    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(transport.dial_count(), 0);
    assert!(result.stdout.contains("urllib-style blocked"));
    assert!(result.stdout.contains("http.client-style blocked"));

    assert_eq!(result.denied_operations.len(), 2);
    for denied in &result.denied_operations {
        assert_eq!(denied.kind, OperationKind::Connect);
        assert_eq!(denied.reason, DenialReason::DenyAll);
    }
    assert_eq!(result.denied_operations[0].detail, "example.com:80");
    assert_eq!(result.denied_operations[1].detail, "api.github.com:443");
}

/// Filesystem probe: nested directories, listing, and the full set of
/// traversal shapes the probes try.
#[test]
fn test_fs_probe_traversal_shapes() {
    init_logging();
    let root = TempDir::new().unwrap();

    let result = SandboxSession::new(SandboxConfig::new(root.path()))
        .unwrap()
        .run(|ctx: &GuestContext| {
            ctx.create_dir("/data/nested")?;
            ctx.write_file("/data/nested/a.txt", b"a")?;
            ctx.write_file("/data/b.txt", b"b")?;
            for name in ctx.list_dir("/data")? {
                ctx.println(name);
            }

            for attempt in ["../outside.txt", "/../../outside.txt", "/data/../../out"] {
                if ctx.read_file(attempt).is_ok() {
                    ctx.println(format!("ATTENTION: {attempt} accessible"));
                }
            }
            Ok(())
        });

    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.stdout, "b.txt\nnested\n");
    assert_eq!(result.denied_operations.len(), 3);
    assert!(result
        .denied_operations
        .iter()
        .all(|d| d.reason == DenialReason::Escape));
}
