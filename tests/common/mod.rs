//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Author recorded by every test invocation
pub const TEST_AUTHOR: &str = "tester";

/// Helper to get an ngt command with a fixed author and no user config
pub fn ngt() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("ngt"));
    cmd.env("NGT_AUTHOR", TEST_AUTHOR)
        .env_remove("NGT_LOG")
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("ngt-test-no-config"));
    cmd
}

/// Helper to create a test project in a temp directory
pub fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    ngt().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Pull the first request ID with `prefix` out of command output
fn find_id(stdout: &[u8], prefix: &str) -> String {
    String::from_utf8_lossy(stdout)
        .split_whitespace()
        .find(|w| w.starts_with(prefix))
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Helper to create a change request; returns its ID
pub fn create_test_change(tmp: &TempDir, title: &str, extra: &[&str]) -> String {
    let output = ngt()
        .current_dir(tmp.path())
        .args(["change", "new", "--title", title])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "change new failed: {:?}", output);
    find_id(&output.stdout, "CHG-")
}

/// Helper to create an exception request; returns its ID
pub fn create_test_exception(tmp: &TempDir, title: &str, extra: &[&str]) -> String {
    let output = ngt()
        .current_dir(tmp.path())
        .args(["exception", "new", "--title", title])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "exception new failed: {:?}", output);
    find_id(&output.stdout, "EXC-")
}

/// Fire an event and return the finished command for assertions
pub fn fire(tmp: &TempDir, kind: &str, id: &str, event: &str) -> assert_cmd::assert::Assert {
    ngt()
        .current_dir(tmp.path())
        .args([kind, "fire", id, event])
        .assert()
}
