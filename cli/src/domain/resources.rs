//! Desired-state specs handed to the platform and the change each call made.
//!
//! Pure data. Platform adapters compare a spec with what exists and report
//! a [`Change`]; they never decide replacement on their own.

use std::fmt;

use cistack_common::{ListenerHandle, PosixIdentity};
use serde::{Deserialize, Serialize};

// ── Change reporting ─────────────────────────────────────────────────────────

/// What an idempotent platform call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Updated,
    Replaced,
    Unchanged,
    Deleted,
}

impl Change {
    /// `true` for anything except [`Change::Unchanged`].
    #[must_use]
    pub fn is_change(self) -> bool {
        self != Self::Unchanged
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Replaced => "replaced",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A handle together with the change that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    pub value: T,
    pub change: Change,
}

impl<T> Applied<T> {
    #[must_use]
    pub fn new(value: T, change: Change) -> Self {
        Self { value, change }
    }

    #[must_use]
    pub fn unchanged(value: T) -> Self {
        Self::new(value, Change::Unchanged)
    }
}

/// One line of a deploy or destroy report: which resource, what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub kind: String,
    pub id: String,
    pub change: Change,
}

impl ResourceChange {
    #[must_use]
    pub fn new(kind: &str, id: impl Into<String>, change: Change) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.into(),
            change,
        }
    }
}

/// What a provisioning stage produced, and every change it made on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput<T> {
    pub value: T,
    pub changes: Vec<ResourceChange>,
}

impl<T> StageOutput<T> {
    #[must_use]
    pub fn new(value: T, changes: Vec<ResourceChange>) -> Self {
        Self { value, changes }
    }
}

// ── Network ──────────────────────────────────────────────────────────────────

/// Where inbound traffic of an ingress rule may come from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressSource {
    SecurityGroup(String),
    Cidr(String),
}

impl fmt::Display for IngressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecurityGroup(id) | Self::Cidr(id) => f.write_str(id),
        }
    }
}

/// A TCP ingress rule attached to a security group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IngressRule {
    pub port: u16,
    pub source: IngressSource,
}

// ── File system ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    GeneralPurpose,
    MaxIo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemSpec {
    pub name: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub security_group_id: String,
    pub encrypted: bool,
    pub performance_mode: PerformanceMode,
}

/// A listener as the platform reports it, with what it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerDescription {
    pub listener: ListenerHandle,
    pub load_balancer_arn: String,
    pub target_group_arn: String,
}

/// A file system as the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemDescription {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub vpc_id: String,
    pub security_group_id: String,
    pub encrypted: bool,
    pub performance_mode: PerformanceMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointSpec {
    pub name: String,
    pub file_system_id: String,
    pub root_path: String,
    pub posix: PosixIdentity,
}

// ── Load balancing ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub security_group_id: String,
    pub internet_facing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupSpec {
    pub name: String,
    pub vpc_id: String,
    pub port: u16,
    pub health_check_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    pub load_balancer_arn: String,
    pub port: u16,
    pub certificate_arn: String,
    pub target_group_arn: String,
}

// ── Identity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    /// Service principal allowed to assume the role.
    pub trusted_service: String,
}

// ── Containers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub desired_count: u32,
    pub subnet_ids: Vec<String>,
    pub security_group_id: String,
    pub target_group_arn: String,
    pub container_name: String,
    pub container_port: u16,
}

// ── DNS ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecordSpec {
    pub zone_id: String,
    pub name: String,
    pub alias_target: String,
}
