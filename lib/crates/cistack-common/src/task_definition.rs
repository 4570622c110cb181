//! Task definition shape, serialized with the container platform's field names.
//!
//! A descriptor is what gets registered; every registration mints a new
//! immutable revision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Container path the Jenkins home volume is mounted at.
pub const JENKINS_HOME_PATH: &str = "/var/jenkins_home";

/// Name of the declared volume that backs [`JENKINS_HOME_PATH`].
pub const HOME_VOLUME_NAME: &str = "jenkins-home";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// One elastic network interface per task.
    Awsvpc,
    Bridge,
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compatibility {
    Fargate,
    Ec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: TransportProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub source_volume: String,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub essential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub mount_points: Vec<MountPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_configuration: Option<LogConfiguration>,
    #[serde(default)]
    pub environment: Vec<KeyValuePair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Toggle {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfsAuthorizationConfig {
    pub access_point_id: String,
    pub iam: Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfsVolumeConfiguration {
    pub file_system_id: String,
    pub transit_encryption: Toggle,
    pub authorization_config: EfsAuthorizationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efs_volume_configuration: Option<EfsVolumeConfiguration>,
}

/// Declarative description of a task: containers, sizing, roles, volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionDescriptor {
    pub family: String,
    pub container_definitions: Vec<ContainerDefinition>,
    /// CPU units (1024 = one vCPU).
    pub cpu: u32,
    /// Memory limit in MiB.
    pub memory: u32,
    pub network_mode: NetworkMode,
    pub requires_compatibilities: Vec<Compatibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<String>,
    #[serde(default)]
    pub volumes: Vec<VolumeDefinition>,
}

impl TaskDefinitionDescriptor {
    /// Whether any container mounts `path`.
    #[must_use]
    pub fn mounts(&self, path: &str) -> bool {
        self.container_definitions
            .iter()
            .flat_map(|c| c.mount_points.iter())
            .any(|m| m.container_path == path)
    }

    /// Role ARNs referenced by the descriptor, execution role first.
    #[must_use]
    pub fn role_arns(&self) -> Vec<&str> {
        [self.execution_role_arn.as_deref(), self.task_role_arn.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// A registered, immutable revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredTaskDefinition {
    pub task_definition_arn: String,
    pub revision: u32,
    pub descriptor: TaskDefinitionDescriptor,
}
