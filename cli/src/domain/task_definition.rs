//! Placeholder construction and the volume-mount derivation.
//!
//! Pure functions only. The derivation clones the placeholder and adds the
//! mount point and the declared volume; nothing else may differ, which
//! [`verify_derivation`] checks field by field.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use cistack_common::{
    Compatibility, ContainerDefinition, EfsAuthorizationConfig, EfsVolumeConfiguration,
    HOME_VOLUME_NAME, JENKINS_HOME_PATH, LogConfiguration, MountPoint, NetworkMode, PortMapping,
    TaskDefinitionDescriptor, Toggle, TransportProtocol, VolumeDefinition, VolumeHandle,
};
use sha2::{Digest, Sha256};

use crate::domain::config::{CONTAINER_NAME, StackConfig};
use crate::domain::error::DerivationError;

/// Task definition the load-balanced service pattern creates on its own:
/// one container, one port, `awslogs`, no volumes.
#[must_use]
pub fn placeholder_descriptor(
    config: &StackConfig,
    region: &str,
    execution_role_arn: &str,
    task_role_arn: &str,
) -> TaskDefinitionDescriptor {
    let options = BTreeMap::from([
        ("awslogs-group".to_string(), config.log_group()),
        ("awslogs-region".to_string(), region.to_string()),
        ("awslogs-stream-prefix".to_string(), config.stack_name.clone()),
    ]);
    TaskDefinitionDescriptor {
        family: config.task_family(),
        container_definitions: vec![ContainerDefinition {
            name: CONTAINER_NAME.to_string(),
            image: config.service.image.clone(),
            essential: true,
            user: Some(config.volume.posix.container_user()),
            port_mappings: vec![PortMapping {
                container_port: config.service.container_port,
                protocol: TransportProtocol::Tcp,
            }],
            mount_points: Vec::new(),
            log_configuration: Some(LogConfiguration {
                log_driver: "awslogs".to_string(),
                options,
            }),
            environment: Vec::new(),
        }],
        cpu: config.service.cpu,
        memory: config.service.memory,
        network_mode: NetworkMode::Awsvpc,
        requires_compatibilities: vec![Compatibility::Fargate],
        execution_role_arn: Some(execution_role_arn.to_string()),
        task_role_arn: Some(task_role_arn.to_string()),
        volumes: Vec::new(),
    }
}

/// Derive the corrected descriptor: the placeholder plus the Jenkins home
/// mount and the transit-encrypted volume bound to the access point.
///
/// # Errors
///
/// Returns a `DerivationError` if the placeholder does not have exactly one
/// container, already declares the home volume, or if the result diverges.
pub fn derive_with_volume(
    placeholder: &TaskDefinitionDescriptor,
    volume: &VolumeHandle,
) -> Result<TaskDefinitionDescriptor, DerivationError> {
    let count = placeholder.container_definitions.len();
    if count != 1 {
        return Err(DerivationError::ContainerCount {
            family: placeholder.family.clone(),
            count,
        });
    }
    if placeholder.volumes.iter().any(|v| v.name == HOME_VOLUME_NAME) {
        return Err(DerivationError::VolumeAlreadyDeclared {
            family: placeholder.family.clone(),
            volume: HOME_VOLUME_NAME.to_string(),
        });
    }

    let mut derived = placeholder.clone();
    for container in &mut derived.container_definitions {
        container.mount_points.push(MountPoint {
            source_volume: HOME_VOLUME_NAME.to_string(),
            container_path: JENKINS_HOME_PATH.to_string(),
            read_only: false,
        });
    }
    derived.volumes.push(VolumeDefinition {
        name: HOME_VOLUME_NAME.to_string(),
        efs_volume_configuration: Some(EfsVolumeConfiguration {
            file_system_id: volume.file_system_id.clone(),
            transit_encryption: Toggle::Enabled,
            authorization_config: EfsAuthorizationConfig {
                access_point_id: volume.access_point.id.clone(),
                iam: Toggle::Disabled,
            },
        }),
    });

    verify_derivation(placeholder, &derived)?;
    Ok(derived)
}

/// Check that `derived` equals `placeholder` except for exactly one added
/// home mount per container and exactly one added home volume.
///
/// # Errors
///
/// Returns `DerivationError::Diverged` naming the first mismatching field.
pub fn verify_derivation(
    placeholder: &TaskDefinitionDescriptor,
    derived: &TaskDefinitionDescriptor,
) -> Result<(), DerivationError> {
    let diverged = |what: &str| Err(DerivationError::Diverged(what.to_string()));

    let home_volumes: Vec<&VolumeDefinition> = derived
        .volumes
        .iter()
        .filter(|v| v.name == HOME_VOLUME_NAME)
        .collect();
    let [home] = home_volumes.as_slice() else {
        return diverged("expected exactly one home volume");
    };
    match &home.efs_volume_configuration {
        Some(efs) if efs.transit_encryption == Toggle::Enabled => {}
        Some(_) => return diverged("home volume must enable transit encryption"),
        None => return diverged("home volume must be an EFS volume"),
    }

    for container in &derived.container_definitions {
        let mounts = container
            .mount_points
            .iter()
            .filter(|m| m.source_volume == HOME_VOLUME_NAME)
            .collect::<Vec<_>>();
        match mounts.as_slice() {
            [m] if m.container_path == JENKINS_HOME_PATH && !m.read_only => {}
            [_] => return diverged("home mount must be read-write at /var/jenkins_home"),
            _ => return diverged("expected exactly one home mount per container"),
        }
    }

    let mut stripped = derived.clone();
    stripped.volumes.retain(|v| v.name != HOME_VOLUME_NAME);
    for container in &mut stripped.container_definitions {
        container
            .mount_points
            .retain(|m| m.source_volume != HOME_VOLUME_NAME);
    }
    match first_difference(placeholder, &stripped) {
        Some(field) => diverged(&format!("field '{field}' differs from the placeholder")),
        None => Ok(()),
    }
}

/// Name of the first top-level field that differs, if any.
fn first_difference(
    a: &TaskDefinitionDescriptor,
    b: &TaskDefinitionDescriptor,
) -> Option<&'static str> {
    if a.family != b.family {
        Some("family")
    } else if a.container_definitions != b.container_definitions {
        Some("containerDefinitions")
    } else if a.cpu != b.cpu {
        Some("cpu")
    } else if a.memory != b.memory {
        Some("memory")
    } else if a.network_mode != b.network_mode {
        Some("networkMode")
    } else if a.requires_compatibilities != b.requires_compatibilities {
        Some("requiresCompatibilities")
    } else if a.execution_role_arn != b.execution_role_arn {
        Some("executionRoleArn")
    } else if a.task_role_arn != b.task_role_arn {
        Some("taskRoleArn")
    } else if a.volumes != b.volumes {
        Some("volumes")
    } else {
        None
    }
}

/// SHA-256 of the descriptor's canonical JSON, lowercase hex.
///
/// Decides whether the override sequence's inputs changed since the last
/// registration.
///
/// # Errors
///
/// Returns an error if the descriptor cannot be serialized.
pub fn fingerprint(descriptor: &TaskDefinitionDescriptor) -> Result<String> {
    let bytes = serde_json::to_vec(descriptor).context("serializing task definition")?;
    Ok(hex_encode(&Sha256::digest(&bytes)))
}

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
