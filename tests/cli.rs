//! CLI integration tests for formwork admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use formwork::store::{SqliteStore, Store};
use formwork::types::Role;
use predicates::prelude::*;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("formwork").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--non-interactive",
            ])
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("formwork.db")).expect("failed to open store")
    }
}

#[test]
fn test_init_creates_database_secret_and_root() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Root user created"))
        .stdout(predicate::str::contains("password:"));

    ctx.temp_dir.child("formwork.db").assert(predicate::path::exists());
    let secret = ctx.temp_dir.child(".session_secret");
    secret.assert(predicate::path::exists());
    secret.assert(predicate::str::is_match("^[0-9a-f]{64}$").unwrap());

    let store = ctx.store();
    assert!(store.has_root_user().unwrap());
    let root = store.get_user_by_name("root").unwrap().unwrap();
    assert_eq!(root.role, Role::Root);
    assert_eq!(root.repos.len(), 1);
    assert!(store.get_shape(&root.repos[0]).unwrap().is_some());
}

#[cfg(unix)]
#[test]
fn test_secret_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new();
    ctx.init().success();

    let mode = std::fs::metadata(ctx.data_dir().join(".session_secret"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_init_twice_fails() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_token_for_root() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "admin",
            "token",
            "--data-dir",
            &ctx.data_dir_str(),
            "--user",
            "root",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[\w-]+\.[\w-]+\.[\w-]+\n$").unwrap());
}

#[test]
fn test_token_for_unknown_user_fails() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "admin",
            "token",
            "--data-dir",
            &ctx.data_dir_str(),
            "--user",
            "nobody",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user named 'nobody'"));
}

#[test]
fn test_token_before_init_fails() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "admin",
            "token",
            "--data-dir",
            &ctx.data_dir_str(),
            "--user",
            "root",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_serve_requires_init() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_serve_rejects_bad_config_file() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.child("formwork.toml");
    config.write_str("port = \"not a number\"\n").unwrap();

    ctx.cmd()
        .args(["serve", "--config", &config.path().to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}
