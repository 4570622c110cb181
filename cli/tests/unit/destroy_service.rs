//! Teardown use-case.

#![allow(clippy::expect_used)]

use cistack_cli::application::ports::{FileSystemApi, ServiceApi, TaskDefinitionApi};
use cistack_cli::application::services::deploy::{DeployOptions, deploy};
use cistack_cli::application::services::destroy::{DestroyOptions, destroy};
use cistack_cli::domain::config::StackConfig;
use cistack_cli::domain::error::DeploymentError;
use cistack_cli::domain::resources::Change;

use crate::helpers::{MemoryDeploymentStore, NullReporter, RecordingPlatform, target};

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

#[tokio::test]
async fn destroy_keeps_cluster_volume_and_revisions() {
    let (platform, store) = deployed().await;
    let before = store.get(&target()).expect("record");
    let topology = before.topology.clone().expect("topology");

    let report = destroy(
        &platform,
        &store,
        &target(),
        DestroyOptions::default(),
        &NullReporter,
    )
    .await
    .expect("destroy");

    assert!(
        report
            .changes
            .iter()
            .any(|c| c.kind == "service" && c.change == Change::Deleted)
    );
    assert!(report.retained.iter().any(|r| r.starts_with("file system")));
    assert!(report.retained.iter().any(|r| r.starts_with("cluster")));

    let after = store.get(&target()).expect("record kept");
    assert!(after.topology.is_none());
    assert!(after.task_override.is_none());
    assert_eq!(after.volume, before.volume);
    assert_eq!(after.cluster, before.cluster);

    let service = platform
        .inner
        .describe_service(&topology.service.cluster_arn, &topology.service.name)
        .await
        .expect("describe");
    assert!(service.is_none());
    let volume = before.volume.expect("volume");
    assert!(
        platform
            .inner
            .describe_file_system(&volume.name)
            .await
            .expect("describe")
            .is_some()
    );
    let revisions = platform
        .inner
        .list_task_definitions(&StackConfig::default().task_family())
        .await
        .expect("list");
    assert_eq!(revisions.len(), 2);
}

#[tokio::test]
async fn purge_removes_volume_and_record() {
    let (platform, store) = deployed().await;
    let volume = store
        .get(&target())
        .and_then(|r| r.volume)
        .expect("volume");

    let report = destroy(
        &platform,
        &store,
        &target(),
        DestroyOptions { purge_volume: true },
        &NullReporter,
    )
    .await
    .expect("destroy");

    assert!(
        report
            .changes
            .iter()
            .any(|c| c.kind == "file_system" && c.change == Change::Deleted)
    );
    assert!(store.get(&target()).is_none());
    assert!(
        platform
            .inner
            .describe_file_system(&volume.name)
            .await
            .expect("describe")
            .is_none()
    );
}

#[tokio::test]
async fn destroy_twice_changes_nothing() {
    let (platform, store) = deployed().await;
    destroy(&platform, &store, &target(), DestroyOptions::default(), &NullReporter)
        .await
        .expect("first destroy");

    let again = destroy(&platform, &store, &target(), DestroyOptions::default(), &NullReporter)
        .await
        .expect("second destroy");
    assert!(again.changes.iter().all(|c| !c.change.is_change()));
}

#[tokio::test]
async fn redeploy_after_destroy_reuses_volume() {
    let (platform, store) = deployed().await;
    let volume = store
        .get(&target())
        .and_then(|r| r.volume)
        .expect("volume");
    destroy(&platform, &store, &target(), DestroyOptions::default(), &NullReporter)
        .await
        .expect("destroy");

    let report = deploy(
        &platform,
        &store,
        &StackConfig::default(),
        &target(),
        DeployOptions::default(),
        &NullReporter,
    )
    .await
    .expect("redeploy");

    assert!(
        report
            .changes
            .iter()
            .any(|c| c.kind == "file_system"
                && c.id == volume.file_system_id
                && c.change == Change::Unchanged)
    );
    assert!(store.get(&target()).expect("record").is_complete());
}

#[tokio::test]
async fn destroy_without_record_is_not_deployed() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();

    let err = destroy(&platform, &store, &target(), DestroyOptions::default(), &NullReporter)
        .await
        .expect_err("nothing to destroy");
    assert!(matches!(
        err.downcast_ref::<DeploymentError>(),
        Some(DeploymentError::NotDeployed { .. })
    ));
    assert!(platform.calls().is_empty());
}
