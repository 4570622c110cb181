//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared resource
//! shapes; never from `crate::infra`, `crate::commands`, or `crate::output`.
//!
//! Every mutating platform call is idempotent: it compares the request with
//! what exists and reports the [`Change`] it made.

use std::path::PathBuf;

use anyhow::Result;
use cistack_common::{
    AccessPointHandle, CertificateHandle, ClusterHandle, DnsRecordHandle, HostedZoneHandle,
    ListenerHandle, LoadBalancerHandle, NetworkHandle, RegisteredTaskDefinition, RoleHandle,
    ServiceHandle, TargetGroupHandle, TaskDefinitionDescriptor,
};

use crate::domain::resources::{
    AccessPointSpec, AliasRecordSpec, Applied, Change, FileSystemDescription, FileSystemSpec,
    IngressRule, ListenerDescription, ListenerSpec, LoadBalancerSpec, RoleSpec, ServiceSpec,
    TargetGroupSpec,
};
use crate::domain::{DeployTarget, DeploymentRecord, StackConfig};

// ── Parameter store ───────────────────────────────────────────────────────────

/// Named configuration entries: resolver inputs and published outputs.
#[allow(async_fn_in_trait)]
pub trait ParameterStore {
    /// Read a parameter, `None` if it is not set.
    async fn get_parameter(&self, name: &str) -> Result<Option<String>>;
    /// Create or overwrite a parameter.
    async fn put_parameter(&self, name: &str, value: &str) -> Result<Change>;
    /// All parameters whose name starts with `prefix`, sorted by name.
    async fn list_parameters(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}

// ── Network ───────────────────────────────────────────────────────────────────

/// VPC lookup and security group management.
#[allow(async_fn_in_trait)]
pub trait NetworkApi {
    /// The account's default VPC.
    async fn default_network(&self) -> Result<NetworkHandle>;
    /// Look up a VPC by id.
    async fn describe_network(&self, vpc_id: &str) -> Result<Option<NetworkHandle>>;
    /// Create the named security group in `vpc_id` unless it exists.
    async fn ensure_security_group(&self, name: &str, vpc_id: &str) -> Result<Applied<String>>;
    async fn delete_security_group(&self, group_id: &str) -> Result<Change>;
    /// Add an ingress rule to `group_id`; `Unchanged` if already present.
    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> Result<Change>;
    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> Result<Change>;
    async fn ingress_rules(&self, group_id: &str) -> Result<Vec<IngressRule>>;
}

// ── Certificates and DNS ──────────────────────────────────────────────────────

#[allow(async_fn_in_trait)]
pub trait CertificateApi {
    async fn describe_certificate(&self, arn: &str) -> Result<Option<CertificateHandle>>;
}

#[allow(async_fn_in_trait)]
pub trait DnsApi {
    /// Look up a hosted zone, `None` unless `zone_id` exists and is named `zone_name`.
    async fn describe_zone(&self, zone_id: &str, zone_name: &str)
    -> Result<Option<HostedZoneHandle>>;
    async fn upsert_alias_record(
        &self,
        spec: &AliasRecordSpec,
    ) -> Result<Applied<DnsRecordHandle>>;
    async fn delete_record(&self, zone_id: &str, name: &str) -> Result<Change>;
}

// ── Containers ────────────────────────────────────────────────────────────────

/// Orchestration clusters.
#[allow(async_fn_in_trait)]
pub trait ClusterApi {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterHandle>>;
    async fn create_cluster(&self, name: &str, vpc_id: &str) -> Result<ClusterHandle>;
}

/// Task definition registration. Registration always mints a new revision.
#[allow(async_fn_in_trait)]
pub trait TaskDefinitionApi {
    async fn register_task_definition(
        &self,
        descriptor: &TaskDefinitionDescriptor,
    ) -> Result<RegisteredTaskDefinition>;
    async fn describe_task_definition(&self, arn: &str)
    -> Result<Option<RegisteredTaskDefinition>>;
    /// Every revision of `family`, oldest first.
    async fn list_task_definitions(&self, family: &str) -> Result<Vec<RegisteredTaskDefinition>>;
}

/// Long-running services.
#[allow(async_fn_in_trait)]
pub trait ServiceApi {
    async fn describe_service(&self, cluster_arn: &str, name: &str)
    -> Result<Option<ServiceHandle>>;
    async fn upsert_service(&self, spec: &ServiceSpec) -> Result<Applied<ServiceHandle>>;
    /// Force the service's task definition property to `task_definition_arn`.
    async fn update_service_task_definition(
        &self,
        cluster_arn: &str,
        name: &str,
        task_definition_arn: &str,
    ) -> Result<Applied<ServiceHandle>>;
    async fn delete_service(&self, cluster_arn: &str, name: &str) -> Result<Change>;
}

// ── Storage ───────────────────────────────────────────────────────────────────

/// Network file systems and their access points.
#[allow(async_fn_in_trait)]
pub trait FileSystemApi {
    async fn describe_file_system(&self, name: &str) -> Result<Option<FileSystemDescription>>;
    async fn create_file_system(&self, spec: &FileSystemSpec) -> Result<FileSystemDescription>;
    async fn delete_file_system(&self, file_system_id: &str) -> Result<Change>;
    async fn describe_access_point(&self, name: &str) -> Result<Option<AccessPointHandle>>;
    async fn create_access_point(&self, spec: &AccessPointSpec) -> Result<AccessPointHandle>;
    async fn delete_access_point(&self, access_point_id: &str) -> Result<Change>;
}

// ── Load balancing ────────────────────────────────────────────────────────────

#[allow(async_fn_in_trait)]
pub trait LoadBalancingApi {
    async fn upsert_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
    ) -> Result<Applied<LoadBalancerHandle>>;
    async fn upsert_target_group(
        &self,
        spec: &TargetGroupSpec,
    ) -> Result<Applied<TargetGroupHandle>>;
    async fn upsert_listener(&self, spec: &ListenerSpec) -> Result<Applied<ListenerHandle>>;
    async fn describe_target_group(&self, name: &str) -> Result<Option<TargetGroupHandle>>;
    async fn describe_listener(&self, arn: &str) -> Result<Option<ListenerDescription>>;
    async fn delete_listener(&self, arn: &str) -> Result<Change>;
    async fn delete_target_group(&self, arn: &str) -> Result<Change>;
    async fn delete_load_balancer(&self, arn: &str) -> Result<Change>;
}

// ── Identity ──────────────────────────────────────────────────────────────────

#[allow(async_fn_in_trait)]
pub trait IamApi {
    /// Principal the current deployment runs as.
    async fn caller_principal(&self) -> Result<String>;
    async fn ensure_role(&self, spec: &RoleSpec) -> Result<Applied<RoleHandle>>;
    async fn delete_role(&self, name: &str) -> Result<Change>;
    /// Allow `principal` to hand `role_arn` to the platform.
    async fn grant_pass_role(&self, principal: &str, role_arn: &str) -> Result<Change>;
    async fn revoke_pass_role(&self, principal: &str, role_arn: &str) -> Result<Change>;
    async fn can_pass_role(&self, principal: &str, role_arn: &str) -> Result<bool>;
}

/// Composite trait: any type implementing every platform port is a `CloudPlatform`.
pub trait CloudPlatform:
    ParameterStore
    + NetworkApi
    + CertificateApi
    + DnsApi
    + ClusterApi
    + TaskDefinitionApi
    + ServiceApi
    + FileSystemApi
    + LoadBalancingApi
    + IamApi
{
}

/// Blanket implementation: any type implementing all platform ports is a `CloudPlatform`.
impl<T> CloudPlatform for T where
    T: ParameterStore
        + NetworkApi
        + CertificateApi
        + DnsApi
        + ClusterApi
        + TaskDefinitionApi
        + ServiceApi
        + FileSystemApi
        + LoadBalancingApi
        + IamApi
{
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait. No async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── State and Config Ports ────────────────────────────────────────────────────

/// Abstracts deployment record persistence (load/save/clear).
#[allow(async_fn_in_trait)]
pub trait DeploymentStore {
    /// Load the record for `target`, returning `None` if nothing was deployed.
    async fn load_async(&self, target: &DeployTarget) -> Result<Option<DeploymentRecord>>;
    /// Persist the given record.
    async fn save_async(&self, record: &DeploymentRecord) -> Result<()>;
    /// Remove the record for `target`.
    async fn clear_async(&self, target: &DeployTarget) -> Result<()>;
}

/// Abstracts loading and saving the stack configuration.
pub trait ConfigStore {
    /// Load configuration, falling back to defaults when no file exists.
    fn load(&self) -> Result<StackConfig>;
    fn save(&self, config: &StackConfig) -> Result<()>;
    /// Path the configuration is read from.
    fn path(&self) -> Result<PathBuf>;
}
