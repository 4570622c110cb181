//! Stack verification against the live platform.

#![allow(clippy::expect_used)]

use cistack_cli::application::ports::{IamApi, NetworkApi, ParameterStore};
use cistack_cli::application::services::deploy::{DeployOptions, deploy};
use cistack_cli::application::services::destroy::{DestroyOptions, destroy};
use cistack_cli::application::services::status::gather_status;
use cistack_cli::domain::checks::StatusReport;
use cistack_cli::domain::config::StackConfig;
use cistack_cli::domain::error::DeploymentError;
use cistack_cli::domain::resources::{IngressRule, IngressSource};
use cistack_common::NFS_PORT;

use crate::helpers::{
    CERTIFICATE_ARN, MemoryDeploymentStore, NullReporter, RecordingPlatform, target,
};

async fn deployed() -> (RecordingPlatform, MemoryDeploymentStore) {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    deploy(
        &platform,
        &store,
        &StackConfig::default(),
        &target(),
        DeployOptions::default(),
        &NullReporter,
    )
    .await
    .expect("deploy");
    (platform, store)
}

async fn status(platform: &RecordingPlatform, store: &MemoryDeploymentStore) -> StatusReport {
    gather_status(platform, store, &StackConfig::default(), &target())
        .await
        .expect("status")
}

fn failed(report: &StatusReport) -> Vec<String> {
    report.defects().iter().map(|c| c.name.clone()).collect()
}

#[tokio::test]
async fn healthy_after_deploy() {
    let (platform, store) = deployed().await;
    let report = status(&platform, &store).await;

    assert!(report.is_healthy(), "defects: {:?}", failed(&report));
    assert!(report.service_task_definition.is_some());
    let listener = report
        .checks
        .iter()
        .find(|c| c.name == "https listener")
        .expect("listener checked");
    assert!(listener.detail.contains("443"), "{}", listener.detail);
    assert!(listener.detail.contains(CERTIFICATE_ARN), "{}", listener.detail);
}

#[tokio::test]
async fn rotated_certificate_is_reported_until_redeploy() {
    let (platform, store) = deployed().await;
    let rotated = "arn:aws:acm:us-east-1:123456789012:certificate/rotated";
    platform
        .inner
        .put_parameter(&StackConfig::default().certificate.arn_parameter, rotated)
        .await
        .expect("rotate");

    let report = status(&platform, &store).await;
    assert_eq!(failed(&report), vec!["https listener".to_string()]);

    deploy(
        &platform,
        &store,
        &StackConfig::default(),
        &target(),
        DeployOptions::default(),
        &NullReporter,
    )
    .await
    .expect("redeploy");
    assert!(status(&platform, &store).await.is_healthy());
}

#[tokio::test]
async fn status_does_not_mutate() {
    let (platform, store) = deployed().await;
    platform.clear_calls();
    status(&platform, &store).await;

    let mutating = [
        "register_task_definition",
        "update_service_task_definition",
        "authorize_ingress",
        "grant_pass_role",
        "put_parameter",
    ];
    for call in platform.calls() {
        assert!(!mutating.contains(&call), "status called {call}");
    }
}

#[tokio::test]
async fn removed_nfs_rule_is_reported() {
    let (platform, store) = deployed().await;
    let record = store.get(&target()).expect("record");
    let service_group = record.topology.expect("topology").service.security_group_id;
    let volume_group = record.volume.expect("volume").security_group_id;
    platform
        .inner
        .revoke_ingress(
            &volume_group,
            &IngressRule {
                port: NFS_PORT,
                source: IngressSource::SecurityGroup(service_group),
            },
        )
        .await
        .expect("revoke");

    let report = status(&platform, &store).await;
    assert_eq!(failed(&report), vec!["nfs reachability (tcp/2049)".to_string()]);
}

#[tokio::test]
async fn revoked_pass_role_is_reported() {
    let (platform, store) = deployed().await;
    let record = store.get(&target()).expect("record");
    let principal = platform.inner.caller_principal().await.expect("principal");
    let execution_role = record.topology.expect("topology").execution_role.arn;
    platform
        .inner
        .revoke_pass_role(&principal, &execution_role)
        .await
        .expect("revoke");

    let report = status(&platform, &store).await;
    assert_eq!(failed(&report), vec!["pass-role grants".to_string()]);
}

#[tokio::test]
async fn placeholder_still_live_is_reported() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    platform.fail_on("update_service_task_definition");
    let _ = deploy(
        &platform,
        &store,
        &StackConfig::default(),
        &target(),
        DeployOptions::default(),
        &NullReporter,
    )
    .await;
    platform.heal();

    let report = status(&platform, &store).await;
    assert!(failed(&report).contains(&"service uses corrected task definition".to_string()));
}

#[tokio::test]
async fn destroyed_service_is_reported() {
    let (platform, store) = deployed().await;
    destroy(&platform, &store, &target(), DestroyOptions::default(), &NullReporter)
        .await
        .expect("destroy");

    let report = status(&platform, &store).await;
    assert!(!report.is_healthy());
    assert!(failed(&report).contains(&"service deployed".to_string()));
}

#[tokio::test]
async fn nothing_recorded_is_not_deployed() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    let err = gather_status(&platform, &store, &StackConfig::default(), &target())
        .await
        .expect_err("not deployed");
    assert!(matches!(
        err.downcast_ref::<DeploymentError>(),
        Some(DeploymentError::NotDeployed { .. })
    ));
}
