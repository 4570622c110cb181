//! Permission grants the corrected task definition needs.
//!
//! Pure functions only. Two kinds of grant exist: handing the task's roles
//! to the platform (pass-role), and NFS ingress between the service and the
//! file system security groups, in both directions.

use cistack_common::{NFS_PORT, TaskDefinitionDescriptor};
use serde::{Deserialize, Serialize};

use crate::domain::error::SequencingError;
use crate::domain::resources::{IngressRule, IngressSource};

/// A directed permission: principal → role, or source group → target group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionGrant {
    PassRole {
        principal: String,
        role_arn: String,
    },
    Ingress {
        target_group_id: String,
        source_group_id: String,
        port: u16,
    },
}

impl PermissionGrant {
    /// Ingress rule this grant adds to its target group, if it is one.
    #[must_use]
    pub fn ingress_rule(&self) -> Option<(&str, IngressRule)> {
        match self {
            Self::Ingress {
                target_group_id,
                source_group_id,
                port,
            } => Some((
                target_group_id.as_str(),
                IngressRule {
                    port: *port,
                    source: IngressSource::SecurityGroup(source_group_id.clone()),
                },
            )),
            Self::PassRole { .. } => None,
        }
    }
}

/// Pass-role grants for both roles of `descriptor`, execution role first.
///
/// # Errors
///
/// Returns a `SequencingError` if either role is missing; nothing may be
/// granted or overridden for such a descriptor.
pub fn pass_role_grants(
    descriptor: &TaskDefinitionDescriptor,
    principal: &str,
) -> Result<Vec<PermissionGrant>, SequencingError> {
    let execution = descriptor.execution_role_arn.as_deref().ok_or_else(|| {
        SequencingError::MissingExecutionRole {
            family: descriptor.family.clone(),
        }
    })?;
    let task = descriptor
        .task_role_arn
        .as_deref()
        .ok_or_else(|| SequencingError::MissingTaskRole {
            family: descriptor.family.clone(),
        })?;
    Ok([execution, task]
        .into_iter()
        .map(|role| PermissionGrant::PassRole {
            principal: principal.to_string(),
            role_arn: role.to_string(),
        })
        .collect())
}

/// NFS ingress in both directions between the service and the volume.
#[must_use]
pub fn nfs_ingress_grants(service_group_id: &str, volume_group_id: &str) -> Vec<PermissionGrant> {
    vec![
        PermissionGrant::Ingress {
            target_group_id: volume_group_id.to_string(),
            source_group_id: service_group_id.to_string(),
            port: NFS_PORT,
        },
        PermissionGrant::Ingress {
            target_group_id: service_group_id.to_string(),
            source_group_id: volume_group_id.to_string(),
            port: NFS_PORT,
        },
    ]
}

/// Direction of NFS traffic that a reachability check found closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NfsDirection {
    ServiceToVolume,
    VolumeToService,
}

/// Report which NFS directions are closed, given the ingress rules currently
/// attached to each security group. An empty result means mounts can succeed.
#[must_use]
pub fn missing_nfs_directions(
    service_group_id: &str,
    service_rules: &[IngressRule],
    volume_group_id: &str,
    volume_rules: &[IngressRule],
) -> Vec<NfsDirection> {
    let allows = |rules: &[IngressRule], source: &str| {
        rules.iter().any(|r| {
            r.port == NFS_PORT && r.source == IngressSource::SecurityGroup(source.to_string())
        })
    };
    let mut missing = Vec::new();
    if !allows(volume_rules, service_group_id) {
        missing.push(NfsDirection::ServiceToVolume);
    }
    if !allows(service_rules, volume_group_id) {
        missing.push(NfsDirection::VolumeToService);
    }
    missing
}
