//! Durable volume: encrypted file system, its security group, and the access
//! point the container mounts.
//!
//! Identity changes on the access point and encryption changes on the file
//! system cannot be applied in place. They are refused with
//! `VolumeError::ReplacementRequired` unless the caller authorised
//! replacement.

use anyhow::{Context, Result};
use cistack_common::{ACCESS_POINT_ROOT, AccessPointHandle, NetworkHandle, VolumeHandle};
use tracing::{info, warn};

use crate::application::ports::{FileSystemApi, NetworkApi, ProgressReporter};
use crate::domain::config::StackConfig;
use crate::domain::error::{PlatformError, VolumeError};
use crate::domain::resources::{
    AccessPointSpec, Change, FileSystemDescription, FileSystemSpec, PerformanceMode,
    ResourceChange, StageOutput,
};

/// Provision the volume.
///
/// # Errors
///
/// Returns `VolumeError::ReplacementRequired` for an unauthorised destructive
/// change, `PlatformError::Conflict` if the file system lives in another
/// network, or any platform error unchanged.
pub async fn provision_volume(
    platform: &(impl NetworkApi + FileSystemApi),
    config: &StackConfig,
    network: &NetworkHandle,
    allow_replacement: bool,
    reporter: &impl ProgressReporter,
) -> Result<StageOutput<VolumeHandle>> {
    reporter.step(&format!("ensuring volume {}...", config.file_system_name()));
    let mut changes = Vec::new();

    let group = platform
        .ensure_security_group(&config.volume_security_group_name(), &network.vpc_id)
        .await
        .context("creating volume security group")?;
    changes.push(ResourceChange::new(
        "security_group",
        &group.value,
        group.change,
    ));

    let spec = FileSystemSpec {
        name: config.file_system_name(),
        vpc_id: network.vpc_id.clone(),
        subnet_ids: network.subnet_ids.clone(),
        security_group_id: group.value.clone(),
        encrypted: true,
        performance_mode: PerformanceMode::GeneralPurpose,
    };
    let (file_system, fs_change) =
        ensure_file_system(platform, &spec, allow_replacement, reporter).await?;
    changes.push(ResourceChange::new("file_system", &file_system.id, fs_change));

    let ap_spec = AccessPointSpec {
        name: config.access_point_name(),
        file_system_id: file_system.id.clone(),
        root_path: ACCESS_POINT_ROOT.to_string(),
        posix: config.volume.posix,
    };
    let (access_point, ap_change) =
        ensure_access_point(platform, &ap_spec, allow_replacement, reporter).await?;
    changes.push(ResourceChange::new("access_point", &access_point.id, ap_change));

    info!(
        file_system = %file_system.id,
        access_point = %access_point.id,
        uid = access_point.posix.uid,
        gid = access_point.posix.gid,
        "volume ready"
    );
    reporter.success(&format!(
        "volume {} ready ({} as {})",
        file_system.name,
        access_point.root_path,
        access_point.posix.container_user()
    ));

    Ok(StageOutput::new(
        VolumeHandle {
            file_system_id: file_system.id,
            file_system_arn: file_system.arn,
            name: file_system.name,
            encrypted: file_system.encrypted,
            security_group_id: group.value,
            access_point,
        },
        changes,
    ))
}

async fn ensure_file_system(
    platform: &impl FileSystemApi,
    spec: &FileSystemSpec,
    allow_replacement: bool,
    reporter: &impl ProgressReporter,
) -> Result<(FileSystemDescription, Change)> {
    let Some(existing) = platform.describe_file_system(&spec.name).await? else {
        let created = platform
            .create_file_system(spec)
            .await
            .with_context(|| format!("creating file system {}", spec.name))?;
        return Ok((created, Change::Created));
    };

    if existing.vpc_id != spec.vpc_id {
        return Err(PlatformError::Conflict {
            kind: "file system",
            id: spec.name.clone(),
            reason: format!("exists in {}, configured network is {}", existing.vpc_id, spec.vpc_id),
        }
        .into());
    }
    if existing.encrypted == spec.encrypted && existing.performance_mode == spec.performance_mode
    {
        return Ok((existing, Change::Unchanged));
    }

    let reason = if existing.encrypted == spec.encrypted {
        "performance mode changed".to_string()
    } else {
        format!("encryption {} -> {}", existing.encrypted, spec.encrypted)
    };
    authorise_replacement(
        &format!("file system {}", spec.name),
        &reason,
        allow_replacement,
        reporter,
    )?;
    platform
        .delete_file_system(&existing.id)
        .await
        .with_context(|| format!("deleting file system {}", existing.id))?;
    let created = platform
        .create_file_system(spec)
        .await
        .with_context(|| format!("recreating file system {}", spec.name))?;
    Ok((created, Change::Replaced))
}

async fn ensure_access_point(
    platform: &impl FileSystemApi,
    spec: &AccessPointSpec,
    allow_replacement: bool,
    reporter: &impl ProgressReporter,
) -> Result<(AccessPointHandle, Change)> {
    let Some(existing) = platform.describe_access_point(&spec.name).await? else {
        let created = platform
            .create_access_point(spec)
            .await
            .with_context(|| format!("creating access point {}", spec.name))?;
        return Ok((created, Change::Created));
    };

    if existing.root_path == spec.root_path && existing.posix == spec.posix {
        return Ok((existing, Change::Unchanged));
    }

    let reason = if existing.root_path == spec.root_path {
        format!(
            "owner {} mode {} -> {} mode {}",
            existing.posix.container_user(),
            existing.posix.permissions_octal(),
            spec.posix.container_user(),
            spec.posix.permissions_octal()
        )
    } else {
        format!("root {} -> {}", existing.root_path, spec.root_path)
    };
    authorise_replacement(
        &format!("access point {}", spec.name),
        &reason,
        allow_replacement,
        reporter,
    )?;
    platform
        .delete_access_point(&existing.id)
        .await
        .with_context(|| format!("deleting access point {}", existing.id))?;
    let created = platform
        .create_access_point(spec)
        .await
        .with_context(|| format!("recreating access point {}", spec.name))?;
    Ok((created, Change::Replaced))
}

fn authorise_replacement(
    resource: &str,
    reason: &str,
    allow_replacement: bool,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    if !allow_replacement {
        return Err(VolumeError::ReplacementRequired {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
        .into());
    }
    warn!(resource, reason, "replacing volume resource");
    reporter.warn(&format!(
        "replacing {resource} ({reason}); data stored under it may be lost"
    ));
    Ok(())
}
