//! Persisted deployment record: the physical identity of every stage's output.
//!
//! A re-run starts from this record, which is what makes deploys idempotent:
//! recorded resources are compared instead of re-created, and the override
//! sequence only registers a new revision when its inputs changed.

use chrono::{DateTime, Utc};
use cistack_common::{ClusterHandle, ServiceTopology, VolumeHandle};
use serde::{Deserialize, Serialize};

use crate::domain::permissions::PermissionGrant;
use crate::domain::target::DeployTarget;

/// Outcome of the last successful task definition override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOverrideRecord {
    /// Fingerprint of the derived descriptor that was registered.
    pub fingerprint: String,
    /// Revision the service was overridden to.
    pub revision_arn: String,
    /// Grants applied for that revision.
    pub grants: Vec<PermissionGrant>,
}

/// Deployment state persisted to `~/.cistack/deployments/<account>-<region>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub target: DeployTarget,
    pub stack_name: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<ServiceTopology>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_override: Option<TaskOverrideRecord>,
}

impl DeploymentRecord {
    /// Empty record for a first deploy.
    #[must_use]
    pub fn new(target: DeployTarget, stack_name: &str) -> Self {
        Self {
            target,
            stack_name: stack_name.to_string(),
            updated_at: Utc::now(),
            cluster: None,
            volume: None,
            topology: None,
            task_override: None,
        }
    }

    /// Revision the service should reference: the override if one was
    /// applied, else the placeholder.
    #[must_use]
    pub fn desired_task_definition(&self) -> Option<&str> {
        self.task_override
            .as_ref()
            .map(|o| o.revision_arn.as_str())
            .or_else(|| {
                self.topology
                    .as_ref()
                    .map(|t| t.placeholder_task_definition_arn.as_str())
            })
    }

    /// `true` once every stage has produced an output.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cluster.is_some()
            && self.volume.is_some()
            && self.topology.is_some()
            && self.task_override.is_some()
    }
}
