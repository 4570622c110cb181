//! Override sequence: derive, register, grant, override.

#![allow(clippy::expect_used)]

use cistack_cli::application::ports::{IamApi, ServiceApi, TaskDefinitionApi};
use cistack_cli::application::services::deploy::{DeployOptions, deploy};
use cistack_cli::application::services::task_override::TaskDefinitionOverrideCoordinator;
use cistack_cli::domain::config::StackConfig;
use cistack_cli::domain::error::{PlatformError, SequencingError};
use cistack_cli::domain::record::DeploymentRecord;
use cistack_cli::domain::resources::Change;
use cistack_common::JENKINS_HOME_PATH;

use crate::helpers::{MemoryDeploymentStore, NullReporter, RecordingPlatform, target};

async fn deployed() -> (RecordingPlatform, MemoryDeploymentStore, DeploymentRecord) {
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
    let record = store.get(&target()).expect("record saved");
    (platform, store, record)
}

#[tokio::test]
async fn steps_run_in_order() {
    let (platform, _, _) = deployed().await;

    let registered = platform
        .last("register_task_definition")
        .expect("derived revision registered");
    let first_grant = platform.first("grant_pass_role").expect("roles granted");
    let last_grant = platform.last("authorize_ingress").expect("nfs opened");
    let overridden = platform
        .first("update_service_task_definition")
        .expect("service overridden");

    assert!(registered < first_grant);
    assert!(last_grant < overridden);
    assert_eq!(platform.last("update_service_task_definition"), Some(overridden));
}

#[tokio::test]
async fn service_runs_derived_revision_with_home_volume() {
    let (platform, _, record) = deployed().await;
    let topology = record.topology.expect("topology");
    let service = platform
        .inner
        .describe_service(&topology.service.cluster_arn, &topology.service.name)
        .await
        .expect("describe")
        .expect("service exists");

    assert_ne!(service.task_definition_arn, topology.placeholder_task_definition_arn);
    let live = platform
        .inner
        .describe_task_definition(&service.task_definition_arn)
        .await
        .expect("describe")
        .expect("revision exists");
    let volume = record.volume.expect("volume");
    let efs = live.descriptor.volumes[0]
        .efs_volume_configuration
        .as_ref()
        .expect("efs volume");
    assert_eq!(efs.file_system_id, volume.file_system_id);
    assert_eq!(efs.authorization_config.access_point_id, volume.access_point.id);
    assert!(live.descriptor.mounts(JENKINS_HOME_PATH));
}

#[tokio::test]
async fn placeholder_without_task_role_stops_before_any_grant() {
    let (platform, _, record) = deployed().await;
    let mut topology = record.topology.clone().expect("topology");
    let volume = record.volume.clone().expect("volume");

    let mut roleless = platform
        .inner
        .describe_task_definition(&topology.placeholder_task_definition_arn)
        .await
        .expect("describe")
        .expect("placeholder")
        .descriptor;
    roleless.task_role_arn = None;
    let registered = platform
        .inner
        .register_task_definition(&roleless)
        .await
        .expect("register roleless placeholder");
    topology.placeholder_task_definition_arn = registered.task_definition_arn;

    platform.clear_calls();
    let coordinator = TaskDefinitionOverrideCoordinator::new(&platform, &topology, &volume);
    let err = coordinator
        .run(None, &NullReporter)
        .await
        .expect_err("missing role must stop the sequence");

    assert!(matches!(
        err.downcast_ref::<SequencingError>(),
        Some(SequencingError::MissingTaskRole { .. })
    ));
    assert!(!platform.called("grant_pass_role"));
    assert!(!platform.called("authorize_ingress"));
    assert!(!platform.called("update_service_task_definition"));
}

#[tokio::test]
async fn override_without_grant_is_denied() {
    let (platform, _, record) = deployed().await;
    let topology = record.topology.clone().expect("topology");
    let volume = record.volume.clone().expect("volume");
    let principal = platform.inner.caller_principal().await.expect("principal");
    platform
        .inner
        .revoke_pass_role(&principal, &topology.task_role.arn)
        .await
        .expect("revoke");

    let coordinator = TaskDefinitionOverrideCoordinator::new(&platform, &topology, &volume);
    let descriptor = coordinator.derive().await.expect("derive");
    let registered = coordinator
        .register(&descriptor, record.task_override.as_ref())
        .await
        .expect("register");
    let err = coordinator
        .override_service(&registered)
        .await
        .expect_err("task role not passable");

    assert!(matches!(
        err.downcast_ref::<PlatformError>(),
        Some(PlatformError::AccessDenied { .. })
    ));
}

#[tokio::test]
async fn failed_override_leaves_previous_revision_live() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    platform.fail_on("update_service_task_definition");

    let result = deploy(
        &platform,
        &store,
        &StackConfig::default(),
        &target(),
        DeployOptions::default(),
        &NullReporter,
    )
    .await;
    assert!(result.is_err());

    let record = store.get(&target()).expect("earlier waves recorded");
    assert!(record.task_override.is_none());
    let topology = record.topology.expect("topology recorded");
    let service = platform
        .inner
        .describe_service(&topology.service.cluster_arn, &topology.service.name)
        .await
        .expect("describe")
        .expect("service exists");
    assert_eq!(service.task_definition_arn, topology.placeholder_task_definition_arn);
}

#[tokio::test]
async fn unchanged_inputs_reuse_recorded_revision() {
    let (platform, _, record) = deployed().await;
    let topology = record.topology.clone().expect("topology");
    let volume = record.volume.clone().expect("volume");
    let revisions_before = platform
        .inner
        .list_task_definitions(&StackConfig::default().task_family())
        .await
        .expect("list")
        .len();

    let coordinator = TaskDefinitionOverrideCoordinator::new(&platform, &topology, &volume);
    let out = coordinator
        .run(record.task_override.as_ref(), &NullReporter)
        .await
        .expect("rerun");

    assert!(out.changes.iter().all(|c| c.change == Change::Unchanged));
    assert_eq!(
        Some(&out.value),
        record.task_override.as_ref(),
        "same fingerprint, revision and grants"
    );
    let revisions_after = platform
        .inner
        .list_task_definitions(&StackConfig::default().task_family())
        .await
        .expect("list")
        .len();
    assert_eq!(revisions_before, revisions_after);
}
