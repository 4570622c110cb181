//! Teardown in reverse stage order.
//!
//! The cluster and its published parameters are shared and always kept.
//! Registered task definition revisions are kept. The volume is kept unless
//! the caller asks to purge it.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::application::ports::{CloudPlatform, DeploymentStore, ProgressReporter};
use crate::domain::error::DeploymentError;
use crate::domain::permissions::PermissionGrant;
use crate::domain::record::DeploymentRecord;
use crate::domain::resources::ResourceChange;
use crate::domain::stages::{Stage, teardown_order};
use crate::domain::target::DeployTarget;

#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyOptions {
    /// Also delete the file system, its access point and security group.
    pub purge_volume: bool,
}

/// Outcome of a teardown.
#[derive(Debug, Clone, Serialize)]
pub struct DestroyReport {
    pub target: DeployTarget,
    pub changes: Vec<ResourceChange>,
    /// Resources deliberately left in place.
    pub retained: Vec<String>,
}

/// Tear down what the record for `target` describes.
///
/// # Errors
///
/// Returns `DeploymentError::NotDeployed` if nothing is recorded, or the
/// first platform error. The record keeps whatever was not yet removed.
pub async fn destroy(
    platform: &impl CloudPlatform,
    store: &impl DeploymentStore,
    target: &DeployTarget,
    options: DestroyOptions,
    reporter: &impl ProgressReporter,
) -> Result<DestroyReport> {
    let Some(mut record) = store.load_async(target).await? else {
        return Err(DeploymentError::NotDeployed {
            target: target.to_string(),
        }
        .into());
    };
    let mut changes = Vec::new();
    let mut retained = Vec::new();

    for stage in teardown_order() {
        match stage {
            Stage::TaskOverride => {
                revoke_override(platform, &record, &mut changes, &mut retained).await?;
                record.task_override = None;
            }
            Stage::ServiceTopology => {
                remove_topology(platform, &record, &mut changes, reporter).await?;
                record.topology = None;
            }
            Stage::Volume if options.purge_volume => {
                purge_volume(platform, &record, &mut changes, reporter).await?;
                record.volume = None;
            }
            Stage::Volume => {
                if let Some(volume) = &record.volume {
                    retained.push(format!("file system {} ({})", volume.name, volume.file_system_id));
                }
            }
            Stage::Cluster => {
                if let Some(cluster) = &record.cluster {
                    retained.push(format!("cluster {}", cluster.name));
                }
            }
            Stage::Environment => {}
        }
        record.updated_at = Utc::now();
        store
            .save_async(&record)
            .await
            .with_context(|| format!("recording teardown of {stage}"))?;
    }

    if options.purge_volume {
        store.clear_async(target).await?;
    }
    info!(
        deploy_target = %target,
        removed = changes.iter().filter(|c| c.change.is_change()).count(),
        "teardown complete"
    );
    reporter.success(&format!("stack {} torn down", record.stack_name));
    Ok(DestroyReport {
        target: target.clone(),
        changes,
        retained,
    })
}

async fn revoke_override(
    platform: &impl CloudPlatform,
    record: &DeploymentRecord,
    changes: &mut Vec<ResourceChange>,
    retained: &mut Vec<String>,
) -> Result<()> {
    let Some(task_override) = &record.task_override else {
        return Ok(());
    };
    for grant in &task_override.grants {
        match grant {
            PermissionGrant::PassRole {
                principal,
                role_arn,
            } => {
                let change = platform.revoke_pass_role(principal, role_arn).await?;
                changes.push(ResourceChange::new("pass_role", role_arn.as_str(), change));
            }
            PermissionGrant::Ingress { .. } => {
                if let Some((group, rule)) = grant.ingress_rule() {
                    let change = platform.revoke_ingress(group, &rule).await?;
                    changes.push(ResourceChange::new(
                        "ingress",
                        format!("{group}:{}", rule.port),
                        change,
                    ));
                }
            }
        }
    }
    retained.push(format!("task definition {}", task_override.revision_arn));
    Ok(())
}

async fn remove_topology(
    platform: &impl CloudPlatform,
    record: &DeploymentRecord,
    changes: &mut Vec<ResourceChange>,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(topology) = &record.topology else {
        return Ok(());
    };
    reporter.step(&format!("removing service {}...", topology.service.name));

    let dns = &topology.dns_record;
    let change = platform.delete_record(&dns.zone_id, &dns.name).await?;
    changes.push(ResourceChange::new("dns_record", &dns.name, change));

    let service = &topology.service;
    let change = platform
        .delete_service(&service.cluster_arn, &service.name)
        .await
        .with_context(|| format!("deleting service {}", service.name))?;
    changes.push(ResourceChange::new("service", &service.name, change));

    let change = platform.delete_listener(&topology.listener.arn).await?;
    changes.push(ResourceChange::new("listener", &topology.listener.arn, change));
    let change = platform
        .delete_target_group(&topology.target_group.arn)
        .await?;
    changes.push(ResourceChange::new(
        "target_group",
        &topology.target_group.name,
        change,
    ));
    let change = platform
        .delete_load_balancer(&topology.load_balancer.arn)
        .await?;
    changes.push(ResourceChange::new(
        "load_balancer",
        &topology.load_balancer.name,
        change,
    ));

    // The service group references the load balancer group.
    for group in [
        &service.security_group_id,
        &topology.load_balancer.security_group_id,
    ] {
        let change = platform
            .delete_security_group(group)
            .await
            .with_context(|| format!("deleting security group {group}"))?;
        changes.push(ResourceChange::new("security_group", group.as_str(), change));
    }

    for role in [&topology.execution_role, &topology.task_role] {
        let change = platform.delete_role(&role.name).await?;
        changes.push(ResourceChange::new("role", &role.name, change));
    }
    Ok(())
}

async fn purge_volume(
    platform: &impl CloudPlatform,
    record: &DeploymentRecord,
    changes: &mut Vec<ResourceChange>,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(volume) = &record.volume else {
        return Ok(());
    };
    reporter.warn(&format!(
        "purging file system {}; its data is deleted",
        volume.name
    ));
    let change = platform
        .delete_access_point(&volume.access_point.id)
        .await?;
    changes.push(ResourceChange::new(
        "access_point",
        &volume.access_point.id,
        change,
    ));
    let change = platform
        .delete_file_system(&volume.file_system_id)
        .await
        .with_context(|| format!("deleting file system {}", volume.file_system_id))?;
    changes.push(ResourceChange::new("file_system", &volume.file_system_id, change));
    let change = platform
        .delete_security_group(&volume.security_group_id)
        .await?;
    changes.push(ResourceChange::new(
        "security_group",
        &volume.security_group_id,
        change,
    ));
    Ok(())
}
