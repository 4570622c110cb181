//! Task definition override: derive → register → grant → override.
//!
//! The service pattern creates its service with a placeholder task
//! definition that has no volume. This coordinator registers the corrected
//! revision out of band, grants what that revision needs, and only then
//! points the live service at it. Any failure before the last step leaves
//! the service untouched.

use anyhow::{Context, Result};
use cistack_common::{
    RegisteredTaskDefinition, ServiceHandle, ServiceTopology, TaskDefinitionDescriptor,
    VolumeHandle,
};
use tracing::{debug, info};

use crate::application::ports::{
    IamApi, NetworkApi, ProgressReporter, ServiceApi, TaskDefinitionApi,
};
use crate::domain::error::PlatformError;
use crate::domain::permissions::{PermissionGrant, nfs_ingress_grants, pass_role_grants};
use crate::domain::record::TaskOverrideRecord;
use crate::domain::resources::{Applied, Change, ResourceChange, StageOutput};
use crate::domain::task_definition::{derive_with_volume, fingerprint};

/// A revision produced by [`TaskDefinitionOverrideCoordinator::register`].
///
/// Grant and override only accept this type, so neither can run against a
/// revision that was not registered first.
#[derive(Debug, Clone)]
pub struct RegisteredRevision {
    pub revision: RegisteredTaskDefinition,
    pub fingerprint: String,
    pub change: Change,
}

impl RegisteredRevision {
    #[must_use]
    pub fn arn(&self) -> &str {
        &self.revision.task_definition_arn
    }
}

/// Drives the four override steps against one service.
pub struct TaskDefinitionOverrideCoordinator<'a, P> {
    platform: &'a P,
    topology: &'a ServiceTopology,
    volume: &'a VolumeHandle,
}

impl<'a, P> TaskDefinitionOverrideCoordinator<'a, P>
where
    P: TaskDefinitionApi + IamApi + NetworkApi + ServiceApi,
{
    #[must_use]
    pub fn new(platform: &'a P, topology: &'a ServiceTopology, volume: &'a VolumeHandle) -> Self {
        Self {
            platform,
            topology,
            volume,
        }
    }

    /// Read the live placeholder and derive the corrected descriptor from it.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` if the placeholder is not registered,
    /// or a `DerivationError` if it cannot be derived from.
    pub async fn derive(&self) -> Result<TaskDefinitionDescriptor> {
        let arn = &self.topology.placeholder_task_definition_arn;
        let placeholder = self
            .platform
            .describe_task_definition(arn)
            .await?
            .ok_or_else(|| PlatformError::NotFound {
                kind: "task definition",
                id: arn.clone(),
            })?;
        let derived = derive_with_volume(&placeholder.descriptor, self.volume)?;
        debug!(family = %derived.family, volumes = derived.volumes.len(), "derived descriptor");
        Ok(derived)
    }

    /// Register `descriptor`, unless `previous` registered the same inputs and
    /// that revision still exists.
    ///
    /// # Errors
    ///
    /// Returns any platform error from registration.
    pub async fn register(
        &self,
        descriptor: &TaskDefinitionDescriptor,
        previous: Option<&TaskOverrideRecord>,
    ) -> Result<RegisteredRevision> {
        let fingerprint = fingerprint(descriptor)?;
        if let Some(prev) = previous.filter(|p| p.fingerprint == fingerprint) {
            if let Some(existing) = self
                .platform
                .describe_task_definition(&prev.revision_arn)
                .await?
            {
                debug!(arn = %prev.revision_arn, "inputs unchanged, reusing revision");
                return Ok(RegisteredRevision {
                    revision: existing,
                    fingerprint,
                    change: Change::Unchanged,
                });
            }
        }
        let revision = self
            .platform
            .register_task_definition(descriptor)
            .await
            .with_context(|| format!("registering task definition {}", descriptor.family))?;
        info!(arn = %revision.task_definition_arn, %fingerprint, "registered task definition");
        Ok(RegisteredRevision {
            revision,
            fingerprint,
            change: Change::Created,
        })
    }

    /// Grant the roles of the registered revision to the deploying principal
    /// and open NFS between the service and the volume in both directions.
    ///
    /// # Errors
    ///
    /// Returns a `SequencingError` if the registered revision lacks a role,
    /// before any grant is applied, or any platform error.
    pub async fn grant(
        &self,
        registered: &RegisteredRevision,
    ) -> Result<Vec<(PermissionGrant, Change)>> {
        let principal = self.platform.caller_principal().await?;
        let mut grants = pass_role_grants(&registered.revision.descriptor, &principal)?;
        grants.extend(nfs_ingress_grants(
            &self.topology.service.security_group_id,
            &self.volume.security_group_id,
        ));

        let mut applied = Vec::with_capacity(grants.len());
        for grant in grants {
            let change = match &grant {
                PermissionGrant::PassRole {
                    principal,
                    role_arn,
                } => self
                    .platform
                    .grant_pass_role(principal, role_arn)
                    .await
                    .with_context(|| format!("granting pass-role on {role_arn}"))?,
                PermissionGrant::Ingress { .. } => {
                    let Some((group, rule)) = grant.ingress_rule() else {
                        continue;
                    };
                    self.platform
                        .authorize_ingress(group, &rule)
                        .await
                        .with_context(|| format!("opening tcp/{} on {group}", rule.port))?
                }
            };
            debug!(?grant, %change, "grant applied");
            applied.push((grant, change));
        }
        Ok(applied)
    }

    /// Point the live service at the registered revision.
    ///
    /// # Errors
    ///
    /// Returns any platform error, including `AccessDenied` if a role of the
    /// revision cannot be passed.
    pub async fn override_service(
        &self,
        registered: &RegisteredRevision,
    ) -> Result<Applied<ServiceHandle>> {
        let service = &self.topology.service;
        let applied = self
            .platform
            .update_service_task_definition(&service.cluster_arn, &service.name, registered.arn())
            .await
            .with_context(|| format!("overriding task definition of {}", service.name))?;
        info!(
            service = %service.name,
            task_definition = %registered.arn(),
            change = %applied.change,
            "service task definition overridden"
        );
        Ok(applied)
    }

    /// Run all four steps in order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step; later steps do not run.
    pub async fn run(
        &self,
        previous: Option<&TaskOverrideRecord>,
        reporter: &impl ProgressReporter,
    ) -> Result<StageOutput<TaskOverrideRecord>> {
        reporter.step("deriving task definition with persistent volume...");
        let descriptor = self.derive().await?;

        let registered = self.register(&descriptor, previous).await?;
        let mut changes = vec![ResourceChange::new(
            "task_definition",
            registered.arn(),
            registered.change,
        )];

        reporter.step("granting roles and NFS access...");
        let grants = self.grant(&registered).await?;
        changes.extend(grants.iter().map(|(grant, change)| grant_change(grant, *change)));

        reporter.step(&format!("overriding {}...", self.topology.service.name));
        let service = self.override_service(&registered).await?;
        changes.push(ResourceChange::new(
            "service",
            &service.value.name,
            service.change,
        ));

        reporter.success(&format!(
            "{} now runs {}",
            service.value.name,
            registered.arn()
        ));
        Ok(StageOutput::new(
            TaskOverrideRecord {
                fingerprint: registered.fingerprint.clone(),
                revision_arn: registered.arn().to_string(),
                grants: grants.into_iter().map(|(grant, _)| grant).collect(),
            },
            changes,
        ))
    }
}

fn grant_change(grant: &PermissionGrant, change: Change) -> ResourceChange {
    match grant {
        PermissionGrant::PassRole { role_arn, .. } => {
            ResourceChange::new("pass_role", role_arn.as_str(), change)
        }
        PermissionGrant::Ingress {
            target_group_id,
            source_group_id,
            port,
        } => ResourceChange::new(
            "ingress",
            format!("{target_group_id}:{port} from {source_group_id}"),
            change,
        ),
    }
}
