//! Application service: stack verification use-case.
//!
//! Observes the live platform and turns each observation into a domain
//! check. Read-only.

use anyhow::Result;

use crate::application::ports::{CloudPlatform, DeploymentStore};
use crate::domain::checks::{
    StackCheck, StatusReport, check_access_point, check_health_check_path, check_nfs_reachability,
    check_override_applied, check_pass_roles, check_published, check_tls_listener,
};
use crate::domain::config::StackConfig;
use crate::domain::error::DeploymentError;
use crate::domain::permissions::missing_nfs_directions;
use crate::domain::target::DeployTarget;

/// Verify the deployed stack against its invariants.
///
/// # Errors
///
/// Returns `DeploymentError::NotDeployed` if nothing is recorded for
/// `target`, or any platform error raised while observing.
pub async fn gather_status(
    platform: &impl CloudPlatform,
    store: &impl DeploymentStore,
    config: &StackConfig,
    target: &DeployTarget,
) -> Result<StatusReport> {
    let record = store
        .load_async(target)
        .await?
        .ok_or_else(|| DeploymentError::NotDeployed {
            target: target.to_string(),
        })?;

    let mut checks = Vec::new();
    let mut live_task_definition = None;

    match (&record.topology, &record.volume) {
        (Some(topology), Some(volume)) => {
            let service = platform
                .describe_service(&topology.service.cluster_arn, &topology.service.name)
                .await?;
            let live_arn = service.as_ref().map(|s| s.task_definition_arn.clone());
            let live = match &live_arn {
                Some(arn) => platform.describe_task_definition(arn).await?,
                None => None,
            };
            checks.push(check_override_applied(
                live_arn.as_deref(),
                live.as_ref().map(|r| &r.descriptor),
                &topology.placeholder_task_definition_arn,
                record.task_override.as_ref().map(|o| o.revision_arn.as_str()),
            ));

            let access_point = platform
                .describe_access_point(&volume.access_point.name)
                .await?;
            checks.push(check_access_point(
                access_point.as_ref(),
                config.volume.posix,
            ));

            let service_group = &topology.service.security_group_id;
            let service_rules = platform.ingress_rules(service_group).await?;
            let volume_rules = platform.ingress_rules(&volume.security_group_id).await?;
            checks.push(check_nfs_reachability(&missing_nfs_directions(
                service_group,
                &service_rules,
                &volume.security_group_id,
                &volume_rules,
            )));

            let principal = platform.caller_principal().await?;
            let role_arns: Vec<String> = match &live {
                Some(revision) => revision
                    .descriptor
                    .role_arns()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                None => vec![
                    topology.execution_role.arn.clone(),
                    topology.task_role.arn.clone(),
                ],
            };
            let mut roles = Vec::with_capacity(role_arns.len());
            for arn in role_arns {
                let ok = platform.can_pass_role(&principal, &arn).await?;
                roles.push((arn, ok));
            }
            checks.push(check_pass_roles(&principal, &roles));

            let target_group = platform
                .describe_target_group(&topology.target_group.name)
                .await?;
            checks.push(check_health_check_path(target_group.as_ref()));

            let listener = platform.describe_listener(&topology.listener.arn).await?;
            let certificate = platform
                .get_parameter(&config.certificate.arn_parameter)
                .await?;
            checks.push(check_tls_listener(
                listener.as_ref(),
                certificate.as_deref(),
                &topology.target_group.arn,
            ));

            live_task_definition = live_arn;
        }
        _ => checks.push(StackCheck {
            name: "service deployed".to_string(),
            ok: false,
            detail: "no service recorded; run 'cistack deploy'".to_string(),
        }),
    }

    if let Some(cluster) = &record.cluster {
        for (name, expected) in [
            (&config.cluster.arn_parameter, &cluster.arn),
            (&config.cluster.name_parameter, &cluster.name),
        ] {
            let actual = platform.get_parameter(name).await?;
            checks.push(check_published(name, expected, actual.as_deref()));
        }
    }

    Ok(StatusReport {
        target: target.clone(),
        stack_name: record.stack_name,
        service_task_definition: live_task_definition,
        checks,
    })
}
