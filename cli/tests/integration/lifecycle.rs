//! End-to-end deploy, status, revisions and destroy against the local
//! platform under a temporary `CISTACK_HOME`.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use tempfile::TempDir;

struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("tempdir"),
        }
    }

    fn cistack(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cistack"));
        cmd.env("NO_COLOR", "1")
            .env("CISTACK_HOME", self.home.path())
            .env("CISTACK_CONFIG", self.home.path().join("config.yaml"))
            .env("CISTACK_ACCOUNT", "123456789012")
            .env("CISTACK_REGION", "us-east-1")
            .env_remove("CISTACK_ALLOW_REPLACEMENT");
        cmd
    }

    fn seed_parameters(&self) {
        for (name, value) in [
            ("/cistack/network/vpc-id", "vpc-56789012"),
            (
                "/cistack/certificate/arn",
                "arn:aws:acm:us-east-1:123456789012:certificate/0a1b2c3d",
            ),
            ("/cistack/dns/zone-id", "Z123ABC"),
            ("/cistack/dns/zone-name", "example.com"),
        ] {
            self.cistack()
                .args(["params", "set", name, value])
                .assert()
                .success();
        }
    }

    fn json(&self, args: &[&str]) -> (bool, serde_json::Value) {
        let output = self
            .cistack()
            .args(args)
            .arg("--json")
            .output()
            .expect("run");
        let json = serde_json::from_slice(&output.stdout).expect("valid JSON");
        (output.status.success(), json)
    }
}

#[test]
fn test_deploy_is_idempotent_and_healthy() {
    let sandbox = Sandbox::new();
    sandbox.seed_parameters();

    let (ok, first) = sandbox.json(&["deploy"]);
    assert!(ok, "{first}");
    assert_eq!(first["noop"], false);
    assert_eq!(first["stack_name"], "jenkins");
    let revision = first["service_task_definition"].clone();

    let (ok, second) = sandbox.json(&["deploy"]);
    assert!(ok, "{second}");
    assert_eq!(second["noop"], true);
    assert_eq!(second["service_task_definition"], revision);

    let (ok, status) = sandbox.json(&["status"]);
    assert!(ok, "{status}");
    assert_eq!(status["healthy"], true);
}

#[test]
fn test_volume_replacement_needs_environment_consent() {
    let sandbox = Sandbox::new();
    sandbox.seed_parameters();
    let (ok, report) = sandbox.json(&["deploy"]);
    assert!(ok, "{report}");

    sandbox
        .cistack()
        .args(["config", "set", "volume.uid", "2000"])
        .assert()
        .success();

    let (ok, err) = sandbox.json(&["deploy"]);
    assert!(!ok);
    assert_eq!(err["code"], "REPLACEMENT_REQUIRED");

    let output = sandbox
        .cistack()
        .env("CISTACK_ALLOW_REPLACEMENT", "1")
        .args(["deploy", "--json"])
        .output()
        .expect("run");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(output.status.success(), "{report}");
    assert_eq!(report["noop"], false);
}

#[test]
fn test_revisions_lists_placeholder_and_live() {
    let sandbox = Sandbox::new();
    sandbox.seed_parameters();
    let (ok, report) = sandbox.json(&["deploy"]);
    assert!(ok, "{report}");

    let (ok, listing) = sandbox.json(&["revisions"]);
    assert!(ok, "{listing}");
    let revisions = listing["revisions"].as_array().expect("revisions array");
    assert_eq!(revisions.len(), 2);
}

#[test]
fn test_destroy_then_status_fails() {
    let sandbox = Sandbox::new();
    sandbox.seed_parameters();
    let (ok, report) = sandbox.json(&["deploy"]);
    assert!(ok, "{report}");

    sandbox
        .cistack()
        .args(["destroy", "-y", "--json"])
        .assert()
        .success();

    let (ok, status) = sandbox.json(&["status"]);
    assert!(!ok);
    assert_eq!(status["healthy"], false);
}

#[test]
fn test_deploy_without_parameters_is_config_error() {
    let sandbox = Sandbox::new();
    let (ok, err) = sandbox.json(&["deploy"]);
    assert!(!ok);
    assert_eq!(err["error"], true);
    assert_eq!(err["code"], "CONFIG_ERROR");
    assert!(
        err["message"]
            .as_str()
            .is_some_and(|m| m.contains("/cistack/network/vpc-id")),
        "{err}"
    );
}

#[test]
fn test_status_before_deploy_is_deployment_error() {
    let sandbox = Sandbox::new();
    let (ok, err) = sandbox.json(&["status"]);
    assert!(!ok);
    assert_eq!(err["code"], "DEPLOYMENT_ERROR");
}

#[test]
fn test_params_get_returns_seeded_value() {
    let sandbox = Sandbox::new();
    sandbox.seed_parameters();
    let (ok, param) = sandbox.json(&["params", "get", "/cistack/dns/zone-name"]);
    assert!(ok, "{param}");
    assert_eq!(param["value"], "example.com");
}
