//! Behavioural smoke tests for the CLI entrypoint.

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

const PLAN: &str = r#"{ "events": [ { "kind": "execute", "command": "uname -a" } ] }"#;

/// Builds a command isolated from any user or project configuration.
fn isolated(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("crrunner");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("CRRUNNER_CONFIG_PATH")
        .env_remove("CRRUNNER_HOST")
        .env_remove("CRRUNNER_PASSWORD")
        .env_remove("CRRUNNER_IDENTITY_FILE")
        .env_remove("RUST_LOG");
    cmd
}

fn scratch() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn write_plan(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("plan.json");
    std::fs::write(&path, body).expect("write plan");
    path
}

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("crrunner");
    cmd.assert().failure().code(2).stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_the_run_subcommand() {
    let mut cmd = cargo_bin_cmd!("crrunner");
    cmd.arg("--help");
    cmd.assert().success().stdout(contains("run"));
}

#[test]
fn cli_run_reports_missing_plan() {
    let dir = scratch();
    let mut cmd = isolated(dir.path());
    cmd.env("CRRUNNER_HOST", "192.0.2.1");
    cmd.args(["run", "absent.json"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("failed to read plan"));
}

#[test]
fn cli_run_reports_malformed_plan() {
    let dir = scratch();
    let plan = write_plan(&dir, r#"{ "events": [ { "kind": "reboot" } ] }"#);
    let mut cmd = isolated(dir.path());
    cmd.env("CRRUNNER_HOST", "192.0.2.1");
    cmd.arg("run").arg(plan);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("failed to parse plan"));
}

#[test]
fn cli_run_requires_a_host() {
    let dir = scratch();
    let plan = write_plan(&dir, PLAN);
    let mut cmd = isolated(dir.path());
    cmd.arg("run").arg(plan);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("CRRUNNER_HOST"));
}

#[test]
fn cli_run_reports_refused_connections() {
    let dir = scratch();
    let plan = write_plan(&dir, PLAN);
    let mut cmd = isolated(dir.path());
    cmd.env("CRRUNNER_HOST", "127.0.0.1")
        .env("CRRUNNER_PORT", "1")
        .env("CRRUNNER_CONNECT_TIMEOUT_SECS", "5");
    cmd.arg("run").arg(plan);

    cmd.assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("127.0.0.1"));
}
