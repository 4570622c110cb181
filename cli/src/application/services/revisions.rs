//! Application service: revision listing.
//!
//! Old revisions are never deregistered by cistack. This lists them so an
//! operator can decide what to clean up.

use anyhow::Result;
use cistack_common::JENKINS_HOME_PATH;
use serde::Serialize;

use crate::application::ports::{DeploymentStore, ServiceApi, TaskDefinitionApi};
use crate::domain::config::StackConfig;
use crate::domain::target::DeployTarget;

/// One registered revision of the stack's task family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionEntry {
    pub arn: String,
    pub revision: u32,
    /// Referenced by the running service.
    pub live: bool,
    /// Registered by the service pattern, without the volume.
    pub placeholder: bool,
    pub mounts_home: bool,
}

/// Every revision of the configured family, oldest first.
///
/// # Errors
///
/// Returns any platform or state error.
pub async fn list_revisions(
    platform: &(impl TaskDefinitionApi + ServiceApi),
    store: &impl DeploymentStore,
    config: &StackConfig,
    target: &DeployTarget,
) -> Result<Vec<RevisionEntry>> {
    let record = store.load_async(target).await?;
    let topology = record.as_ref().and_then(|r| r.topology.as_ref());

    let live = match topology {
        Some(t) => platform
            .describe_service(&t.service.cluster_arn, &t.service.name)
            .await?
            .map(|s| s.task_definition_arn),
        None => None,
    };
    let placeholder = topology.map(|t| t.placeholder_task_definition_arn.as_str());

    let revisions = platform
        .list_task_definitions(&config.task_family())
        .await?;
    Ok(revisions
        .into_iter()
        .map(|r| RevisionEntry {
            live: live.as_deref() == Some(r.task_definition_arn.as_str()),
            placeholder: placeholder == Some(r.task_definition_arn.as_str()),
            mounts_home: r.descriptor.mounts(JENKINS_HOME_PATH),
            revision: r.revision,
            arn: r.task_definition_arn,
        })
        .collect())
}
