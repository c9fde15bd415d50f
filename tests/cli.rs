//! Integration tests: run the ordmap binary and check exit codes and output.

use std::path::Path;
use std::process::Command;

fn ordmap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ordmap"));
    cmd.env("NO_COLOR", "1")
        .env_remove("ORDMAP_MAX_WORKERS")
        .env_remove("ORDMAP_FAILURE_POLICY")
        .env_remove("ORDMAP_DELAY_MS")
        .env_remove("ORDMAP_LOG");
    cmd
}

/// Isolated from the user's ~/.ordmaprc.
fn ordmap_in(dir: &Path) -> Command {
    let mut cmd = ordmap();
    cmd.current_dir(dir).env("HOME", dir).env("USERPROFILE", dir);
    cmd
}

#[test]
fn test_help() {
    let out = ordmap().arg("--help").output().unwrap();
    assert!(out.status.success(), "ordmap --help should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("compare"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_version() {
    let out = ordmap().arg("--version").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_run_default_values_json() {
    let td = tempfile::tempdir().unwrap();
    let out = ordmap_in(td.path())
        .args(["run", "--delay-ms", "1..5", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["output"], serde_json::json!([0, 2, 4, 6, 8, 10, 12, 14, 16, 18]));
    assert_eq!(report["workers"], 10);
}

#[test]
fn test_run_given_values_text() {
    let td = tempfile::tempdir().unwrap();
    let out = ordmap_in(td.path())
        .args(["run", "3", "-1", "4", "-d", "0", "-q"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Output: [6, -2, 8]"), "stdout: {}", stdout);
}

#[test]
fn test_run_overflow_collect_all_fails() {
    let td = tempfile::tempdir().unwrap();
    let out = ordmap_in(td.path())
        .args(["run", "1", "9223372036854775807", "-d", "0", "--policy", "collect-all"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Output: [2, -]"), "stdout: {}", stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed"));
}

#[test]
fn test_zero_workers_rejected() {
    let td = tempfile::tempdir().unwrap();
    let out = ordmap_in(td.path())
        .args(["run", "--workers", "0", "-d", "0"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("max_workers"));
}

#[test]
fn test_compare_json() {
    let td = tempfile::tempdir().unwrap();
    let out = ordmap_in(td.path())
        .args(["compare", "1", "2", "3", "4", "--delay-ms", "20", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["output"], serde_json::json!([2, 4, 6, 8]));
    assert!(report["sequentialMs"].as_u64().unwrap() >= 80);
}

#[test]
fn test_config_reads_rc_file() {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(
        td.path().join(".ordmaprc"),
        r#"{ "maxWorkers": 3, "failurePolicy": "collect-all" }"#,
    )
    .unwrap();
    let out = ordmap_in(td.path()).arg("config").output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["effective"]["mapper"]["maxWorkers"], 3);
    assert_eq!(value["effective"]["mapper"]["failurePolicy"], "collect-all");
}

#[test]
fn test_env_overrides_rc_file() {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(td.path().join(".ordmaprc"), r#"{ "maxWorkers": 3 }"#).unwrap();
    let out = ordmap_in(td.path())
        .env("ORDMAP_MAX_WORKERS", "5")
        .arg("config")
        .output()
        .unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["file"]["maxWorkers"], 5);
}

#[test]
fn test_malformed_rc_file_fails() {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(td.path().join(".ordmaprc"), "{ nope").unwrap();
    let out = ordmap_in(td.path()).args(["run", "-d", "0"]).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains(".ordmaprc"));
}
