//! Opaque identities of provisioned (or looked-up) resources.
//!
//! Handles are what one provisioning stage hands to the next. They carry
//! identifiers only; the platform owns the resources themselves.

use serde::{Deserialize, Serialize};

/// NFS port the container uses to reach the file system mount targets.
pub const NFS_PORT: u16 = 2049;

/// Port of the public TLS listener.
pub const HTTPS_PORT: u16 = 443;

/// Directory inside the file system exposed by the access point.
pub const ACCESS_POINT_ROOT: &str = "/jenkins";

/// Target group health check path. Jenkins answers `/` with a 403 until
/// the caller is authenticated; `/login` is reachable anonymously.
pub const HEALTH_CHECK_PATH: &str = "/login";

/// Resolved network: the VPC and the subnets services and mount targets use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub is_default: bool,
}

/// TLS certificate bound to the public listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateHandle {
    pub arn: String,
}

/// Public DNS zone that receives the service alias record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneHandle {
    pub zone_id: String,
    pub zone_name: String,
}

/// Orchestration cluster. Created once, never destroyed by cistack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHandle {
    pub arn: String,
    pub name: String,
    pub vpc_id: String,
}

/// POSIX owner and permission bits enforced by an access point.
///
/// The container must run as the same uid/gid, otherwise it cannot write to
/// the mounted directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosixIdentity {
    pub uid: u32,
    pub gid: u32,
    /// Octal permission bits applied to the access point root, e.g. `0o777`.
    pub permissions: u32,
}

impl PosixIdentity {
    /// `uid:gid` form used for the container `user` field.
    #[must_use]
    pub fn container_user(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }

    /// Permission bits rendered the way the platform API expects them (`"777"`).
    #[must_use]
    pub fn permissions_octal(&self) -> String {
        format!("{:o}", self.permissions)
    }
}

impl Default for PosixIdentity {
    fn default() -> Self {
        Self {
            uid: 1000,
            gid: 1000,
            permissions: 0o777,
        }
    }
}

/// Scoped entry point into the file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointHandle {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub root_path: String,
    pub posix: PosixIdentity,
}

/// Durable network file system plus the access point the container mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeHandle {
    pub file_system_id: String,
    pub file_system_arn: String,
    pub name: String,
    pub encrypted: bool,
    /// Security group attached to the mount targets.
    pub security_group_id: String,
    pub access_point: AccessPointHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerHandle {
    pub arn: String,
    pub name: String,
    pub dns_name: String,
    pub security_group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupHandle {
    pub arn: String,
    pub name: String,
    pub port: u16,
    pub health_check_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerHandle {
    pub arn: String,
    pub port: u16,
    pub certificate_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleHandle {
    pub arn: String,
    pub name: String,
}

/// Running service as last observed or applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHandle {
    pub arn: String,
    pub name: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub desired_count: u32,
    pub security_group_id: String,
    pub target_group_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordHandle {
    pub zone_id: String,
    pub name: String,
    pub alias_target: String,
}

/// Everything the load-balanced service pattern produces.
///
/// The task definition inside is the placeholder; the service's live
/// reference is replaced afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTopology {
    pub load_balancer: LoadBalancerHandle,
    pub target_group: TargetGroupHandle,
    pub listener: ListenerHandle,
    pub execution_role: RoleHandle,
    pub task_role: RoleHandle,
    pub placeholder_task_definition_arn: String,
    pub service: ServiceHandle,
    pub dns_record: DnsRecordHandle,
}
