//! Revision listing.

#![allow(clippy::expect_used)]

use cistack_cli::application::services::deploy::{DeployOptions, deploy};
use cistack_cli::application::services::revisions::list_revisions;
use cistack_cli::domain::config::StackConfig;

use crate::helpers::{MemoryDeploymentStore, NullReporter, RecordingPlatform, target};

#[tokio::test]
async fn lists_placeholder_and_live_revision() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    let config = StackConfig::default();
    deploy(&platform, &store, &config, &target(), DeployOptions::default(), &NullReporter)
        .await
        .expect("deploy");

    let entries = list_revisions(&platform, &store, &config, &target())
        .await
        .expect("list");

    assert_eq!(entries.len(), 2);
    let (placeholder, live) = (&entries[0], &entries[1]);
    assert!(placeholder.placeholder && !placeholder.live && !placeholder.mounts_home);
    assert!(live.live && !live.placeholder && live.mounts_home);
    assert_eq!((placeholder.revision, live.revision), (1, 2));
}

#[tokio::test]
async fn old_revisions_stay_listed_after_change() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    let mut config = StackConfig::default();
    deploy(&platform, &store, &config, &target(), DeployOptions::default(), &NullReporter)
        .await
        .expect("deploy");
    config.service.desired_count = 2;
    config.service.memory = 2048;
    deploy(&platform, &store, &config, &target(), DeployOptions::default(), &NullReporter)
        .await
        .expect("redeploy");

    let entries = list_revisions(&platform, &store, &config, &target())
        .await
        .expect("list");
    assert_eq!(entries.len(), 4);
    assert_eq!(entries.iter().filter(|e| e.live).count(), 1);
    assert!(entries[3].live);
}

#[tokio::test]
async fn nothing_deployed_lists_nothing() {
    let platform = RecordingPlatform::seeded().await;
    let store = MemoryDeploymentStore::default();
    let entries = list_revisions(&platform, &store, &StackConfig::default(), &target())
        .await
        .expect("list");
    assert!(entries.is_empty());
}
