//! Integration tests for the CLI skeleton: help, version, argument errors.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn cistack() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cistack"));
    cmd.env("NO_COLOR", "1")
        .env_remove("CISTACK_ACCOUNT")
        .env_remove("CISTACK_REGION");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    cistack().env_remove("NO_COLOR").assert().code(2).stderr(predicate::str::contains(
        "Jenkins on a managed container platform",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    let output = cistack().arg("--help").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["deploy", "destroy", "status", "revisions", "params", "config", "version"] {
        assert!(stdout.contains(command), "missing {command} in help:\n{stdout}");
    }
}

#[test]
fn test_cli_version_flag_shows_version() {
    cistack()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cistack"));
}

#[test]
fn test_version_command_shows_version() {
    cistack()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "cistack {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = cistack()
        .args(["version", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// --- Argument errors ---

#[test]
fn test_deploy_without_target_is_usage_error() {
    cistack()
        .arg("deploy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--account"));
}

#[test]
fn test_deploy_accepts_only_target_flags() {
    cistack()
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--account"))
        .stdout(predicate::str::contains("--allow-replacement").not());

    cistack()
        .args([
            "deploy",
            "--account",
            "123456789012",
            "--region",
            "us-east-1",
            "--allow-replacement",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_destroy_help_shows_purge_volume() {
    cistack()
        .args(["destroy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--purge-volume"));
}

#[test]
fn test_malformed_account_is_config_error() {
    let home = tempfile::TempDir::new().expect("temp dir");
    let output = cistack()
        .env("CISTACK_HOME", home.path())
        .args(["status", "--json", "--account", "12345", "--region", "us-east-1"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["error"], true);
    assert_eq!(json["code"], "CONFIG_ERROR");
}

#[test]
fn test_unknown_command_fails() {
    cistack()
        .arg("bogus")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
