//! File-backed implementation of every platform port.
//!
//! `LocalPlatform` keeps resources exactly as the cloud API contract shapes
//! them (names, ARNs, revisions, ingress rules, pass-role grants) and
//! enforces the contract's rejections. It does not run containers.
//!
//! State lives behind a `std::sync::Mutex`. Every mutation runs against a
//! copy that replaces the live state only if the call succeeds and the copy
//! has been written to `$CISTACK_HOME/platform/<account>-<region>.json`
//! (skipped when in-memory). Writers queue on an async lock so the file
//! write happens on the blocking pool without losing concurrent updates.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{LazyLock, Mutex};

use anyhow::{Context, Result};
use cistack_common::{
    AccessPointHandle, Arn, CertificateHandle, ClusterHandle, Compatibility, DnsRecordHandle,
    HostedZoneHandle, ListenerHandle, LoadBalancerHandle, NetworkHandle, NetworkMode,
    RegisteredTaskDefinition, RoleHandle, ServiceHandle, TargetGroupHandle,
    TaskDefinitionDescriptor, TaskDefinitionRef,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::{
    CertificateApi, ClusterApi, DnsApi, FileSystemApi, IamApi, LoadBalancingApi, NetworkApi,
    ParameterStore, ServiceApi, TaskDefinitionApi,
};
use crate::domain::config::valid_memory_for_cpu;
use crate::domain::error::{PlatformError, SequencingError};
use crate::domain::resources::{
    AccessPointSpec, AliasRecordSpec, Applied, Change, FileSystemDescription, FileSystemSpec,
    IngressRule, IngressSource, ListenerDescription, ListenerSpec, LoadBalancerSpec, RoleSpec,
    ServiceSpec, TargetGroupSpec,
};
use crate::domain::target::DeployTarget;
use crate::infra::fs::{cistack_home, write_atomic};

static VPC_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^vpc-[0-9a-f]{8,17}$").expect("valid regex")
});

static ZONE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^Z[A-Z0-9]{4,31}$").expect("valid regex")
});

static ZONE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?$").expect("valid regex")
});

/// Principal deployments run as on the local platform.
const DEPLOYER_ROLE: &str = "role/cistack-deployer";

// ── Stored state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PlatformState {
    next_id: u64,
    parameters: BTreeMap<String, String>,
    /// Keyed by group id.
    security_groups: BTreeMap<String, SecurityGroup>,
    /// Keyed by name.
    clusters: BTreeMap<String, ClusterHandle>,
    /// Keyed by file system id.
    file_systems: BTreeMap<String, FileSystemDescription>,
    /// Keyed by access point id.
    access_points: BTreeMap<String, StoredAccessPoint>,
    /// Keyed by name.
    load_balancers: BTreeMap<String, StoredLoadBalancer>,
    /// Keyed by name.
    target_groups: BTreeMap<String, StoredTargetGroup>,
    /// Keyed by ARN.
    listeners: BTreeMap<String, StoredListener>,
    /// Keyed by name.
    roles: BTreeMap<String, StoredRole>,
    pass_role: BTreeSet<PassRoleGrant>,
    /// Revisions per family, revision `n` at index `n - 1`.
    task_definitions: BTreeMap<String, Vec<RegisteredTaskDefinition>>,
    /// Keyed by `<cluster arn>|<name>`.
    services: BTreeMap<String, StoredService>,
    /// Keyed by `<zone id>|<record name>`.
    dns_records: BTreeMap<String, DnsRecordHandle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecurityGroup {
    id: String,
    name: String,
    vpc_id: String,
    ingress: BTreeSet<IngressRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccessPoint {
    handle: AccessPointHandle,
    file_system_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredLoadBalancer {
    handle: LoadBalancerHandle,
    vpc_id: String,
    subnet_ids: Vec<String>,
    internet_facing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTargetGroup {
    handle: TargetGroupHandle,
    vpc_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredListener {
    handle: ListenerHandle,
    load_balancer_arn: String,
    target_group_arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRole {
    handle: RoleHandle,
    trusted_service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct PassRoleGrant {
    principal: String,
    role_arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredService {
    handle: ServiceHandle,
    subnet_ids: Vec<String>,
    container_name: String,
    container_port: u16,
}

impl PlatformState {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:017x}", self.next_id)
    }

    fn group(&self, id: &str) -> Result<&SecurityGroup> {
        self.security_groups.get(id).ok_or_else(|| {
            PlatformError::NotFound {
                kind: "security group",
                id: id.to_string(),
            }
            .into()
        })
    }

    fn role_exists(&self, arn: &str) -> bool {
        self.roles.values().any(|r| r.handle.arn == arn)
    }

    fn task_definition(&self, arn: &str) -> Option<&RegisteredTaskDefinition> {
        let reference = TaskDefinitionRef::from_arn(arn).ok()?;
        let index = usize::try_from(reference.revision.checked_sub(1)?).ok()?;
        self.task_definitions
            .get(&reference.family)?
            .get(index)
            .filter(|r| r.task_definition_arn == arn)
    }
}

fn service_key(cluster_arn: &str, name: &str) -> String {
    format!("{cluster_arn}|{name}")
}

/// `Unchanged` if `existing` equals `desired`, else `Updated`.
fn compare<T: PartialEq>(existing: &T, desired: &T) -> Change {
    if existing == desired {
        Change::Unchanged
    } else {
        Change::Updated
    }
}

fn removed(found: bool) -> Change {
    if found {
        Change::Deleted
    } else {
        Change::Unchanged
    }
}

// ── LocalPlatform ─────────────────────────────────────────────────────────────

/// Contract-level platform for one account and region.
#[derive(Debug)]
pub struct LocalPlatform {
    target: DeployTarget,
    principal: String,
    path: Option<PathBuf>,
    state: Mutex<PlatformState>,
    writer: tokio::sync::Mutex<()>,
}

impl LocalPlatform {
    /// Platform that lives only as long as the value (used in tests).
    #[must_use]
    pub fn in_memory(target: DeployTarget) -> Self {
        let principal = Arn::global("iam", &target.account, DEPLOYER_ROLE).to_string();
        Self {
            target,
            principal,
            path: None,
            state: Mutex::new(PlatformState::default()),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Platform persisted under `$CISTACK_HOME/platform/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or an
    /// existing state file cannot be read.
    pub fn open(target: DeployTarget) -> Result<Self> {
        let path = cistack_home()?
            .join("platform")
            .join(format!("{}.json", target.key()));
        Self::open_at(target, path)
    }

    /// Platform persisted at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing state file cannot be read or parsed.
    pub fn open_at(target: DeployTarget, path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading platform state {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing platform state {}", path.display()))?
        } else {
            PlatformState::default()
        };
        let mut platform = Self::in_memory(target);
        platform.path = Some(path);
        platform.state = Mutex::new(state);
        Ok(platform)
    }

    fn read<R>(&self, f: impl FnOnce(&PlatformState) -> R) -> Result<R> {
        let guard = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("platform state lock poisoned"))?;
        Ok(f(&guard))
    }

    async fn write<R>(&self, f: impl FnOnce(&mut PlatformState) -> Result<R>) -> Result<R> {
        let _writer = self.writer.lock().await;
        let (next, out) = {
            let guard = self
                .state
                .lock()
                .map_err(|_| anyhow::anyhow!("platform state lock poisoned"))?;
            let mut next = guard.clone();
            let out = f(&mut next)?;
            (next, out)
        };
        if let Some(path) = &self.path {
            let content = serde_json::to_string_pretty(&next).context("serializing platform state")?;
            let path = path.clone();
            tokio::task::spawn_blocking(move || write_atomic(&path, &content))
                .await
                .context("platform state write task panicked")??;
        }
        *self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("platform state lock poisoned"))? = next;
        Ok(out)
    }

    fn arn(&self, service: &str, resource: impl Into<String>) -> String {
        Arn::new(service, &self.target.region, &self.target.account, resource).to_string()
    }

    fn default_vpc_id(&self) -> String {
        let account = &self.target.account;
        format!("vpc-{}", &account[account.len().saturating_sub(8)..])
    }

    fn network(&self, vpc_id: &str) -> NetworkHandle {
        let suffix = vpc_id.trim_start_matches("vpc-");
        NetworkHandle {
            vpc_id: vpc_id.to_string(),
            subnet_ids: vec![format!("subnet-{suffix}a"), format!("subnet-{suffix}b")],
            is_default: vpc_id == self.default_vpc_id(),
        }
    }

    fn certificate_issued(&self, arn: &str) -> bool {
        Arn::parse_for(arn, "acm").is_ok_and(|a| {
            a.region == self.target.region
                && a.account == self.target.account
                && a.resource.starts_with("certificate/")
        })
    }

    /// Registration checks the cloud API applies to a descriptor.
    fn check_descriptor(
        state: &PlatformState,
        descriptor: &TaskDefinitionDescriptor,
    ) -> Result<()> {
        let reject = |reason: String| -> anyhow::Error {
            PlatformError::Rejected {
                kind: "task definition",
                id: descriptor.family.clone(),
                reason,
            }
            .into()
        };
        if descriptor.family.is_empty() {
            return Err(reject("family is empty".to_string()));
        }
        if descriptor.container_definitions.is_empty() {
            return Err(reject("no container definitions".to_string()));
        }
        if descriptor
            .requires_compatibilities
            .contains(&Compatibility::Fargate)
        {
            if descriptor.network_mode != NetworkMode::Awsvpc {
                return Err(reject("Fargate requires the awsvpc network mode".to_string()));
            }
            let valid = valid_memory_for_cpu(descriptor.cpu).unwrap_or_default();
            if !valid.contains(&descriptor.memory) {
                return Err(reject(format!(
                    "{} MiB is not valid with {} CPU units",
                    descriptor.memory, descriptor.cpu
                )));
            }
        }
        for role in descriptor.role_arns() {
            if !state.role_exists(role) {
                return Err(reject(format!("role {role} does not exist")));
            }
        }
        for volume in &descriptor.volumes {
            let Some(efs) = &volume.efs_volume_configuration else {
                continue;
            };
            if !state.file_systems.contains_key(&efs.file_system_id) {
                return Err(reject(format!(
                    "volume {} references unknown file system {}",
                    volume.name, efs.file_system_id
                )));
            }
            let access_point = &efs.authorization_config.access_point_id;
            match state.access_points.get(access_point) {
                Some(ap) if ap.file_system_id == efs.file_system_id => {}
                _ => {
                    return Err(reject(format!(
                        "access point {access_point} does not belong to {}",
                        efs.file_system_id
                    )));
                }
            }
        }
        for container in &descriptor.container_definitions {
            for mount in &container.mount_points {
                if !descriptor.volumes.iter().any(|v| v.name == mount.source_volume) {
                    return Err(reject(format!(
                        "container {} mounts undeclared volume {}",
                        container.name, mount.source_volume
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── Parameter store ───────────────────────────────────────────────────────────

impl ParameterStore for LocalPlatform {
    async fn get_parameter(&self, name: &str) -> Result<Option<String>> {
        self.read(|s| s.parameters.get(name).cloned())
    }

    async fn put_parameter(&self, name: &str, value: &str) -> Result<Change> {
        self.write(|s| {
            let change = match s.parameters.insert(name.to_string(), value.to_string()) {
                Some(previous) => compare(&previous.as_str(), &value),
                None => Change::Created,
            };
            debug!(name, %change, "put parameter");
            Ok(change)
        })
        .await
    }

    async fn list_parameters(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        self.read(|s| {
            s.parameters
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

impl NetworkApi for LocalPlatform {
    async fn default_network(&self) -> Result<NetworkHandle> {
        Ok(self.network(&self.default_vpc_id()))
    }

    async fn describe_network(&self, vpc_id: &str) -> Result<Option<NetworkHandle>> {
        Ok(VPC_ID_RE.is_match(vpc_id).then(|| self.network(vpc_id)))
    }

    async fn ensure_security_group(&self, name: &str, vpc_id: &str) -> Result<Applied<String>> {
        if !VPC_ID_RE.is_match(vpc_id) {
            return Err(PlatformError::NotFound {
                kind: "vpc",
                id: vpc_id.to_string(),
            }
            .into());
        }
        self.write(|s| {
            if let Some(existing) = s
                .security_groups
                .values()
                .find(|g| g.name == name && g.vpc_id == vpc_id)
            {
                return Ok(Applied::unchanged(existing.id.clone()));
            }
            let id = s.mint_id("sg");
            s.security_groups.insert(
                id.clone(),
                SecurityGroup {
                    id: id.clone(),
                    name: name.to_string(),
                    vpc_id: vpc_id.to_string(),
                    ingress: BTreeSet::new(),
                },
            );
            debug!(%id, name, vpc_id, "created security group");
            Ok(Applied::new(id, Change::Created))
        })
        .await
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<Change> {
        self.write(|s| {
            if !s.security_groups.contains_key(group_id) {
                return Ok(Change::Unchanged);
            }
            let conflict = |reason: String| -> anyhow::Error {
                PlatformError::Conflict {
                    kind: "security group",
                    id: group_id.to_string(),
                    reason,
                }
                .into()
            };
            let source = IngressSource::SecurityGroup(group_id.to_string());
            if let Some(other) = s
                .security_groups
                .values()
                .find(|g| g.id != group_id && g.ingress.iter().any(|r| r.source == source))
            {
                return Err(conflict(format!("referenced by rules of {}", other.id)));
            }
            if let Some(svc) = s
                .services
                .values()
                .find(|svc| svc.handle.security_group_id == group_id)
            {
                return Err(conflict(format!("in use by service {}", svc.handle.name)));
            }
            if let Some(lb) = s
                .load_balancers
                .values()
                .find(|lb| lb.handle.security_group_id == group_id)
            {
                return Err(conflict(format!("in use by load balancer {}", lb.handle.name)));
            }
            if let Some(fs) = s
                .file_systems
                .values()
                .find(|fs| fs.security_group_id == group_id)
            {
                return Err(conflict(format!("in use by file system {}", fs.id)));
            }
            s.security_groups.remove(group_id);
            debug!(group_id, "deleted security group");
            Ok(Change::Deleted)
        })
        .await
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> Result<Change> {
        self.write(|s| {
            if let IngressSource::SecurityGroup(source) = &rule.source {
                s.group(source)?;
            }
            s.group(group_id)?;
            let inserted = s
                .security_groups
                .get_mut(group_id)
                .is_some_and(|g| g.ingress.insert(rule.clone()));
            let change = if inserted {
                Change::Created
            } else {
                Change::Unchanged
            };
            debug!(group_id, port = rule.port, source = %rule.source, %change, "authorize ingress");
            Ok(change)
        })
        .await
    }

    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> Result<Change> {
        self.write(|s| {
            let found = s
                .security_groups
                .get_mut(group_id)
                .is_some_and(|g| g.ingress.remove(rule));
            Ok(removed(found))
        })
        .await
    }

    async fn ingress_rules(&self, group_id: &str) -> Result<Vec<IngressRule>> {
        self.read(|s| {
            s.security_groups
                .get(group_id)
                .map(|g| g.ingress.iter().cloned().collect())
                .unwrap_or_default()
        })
    }
}

// ── Certificates and DNS ──────────────────────────────────────────────────────

impl CertificateApi for LocalPlatform {
    async fn describe_certificate(&self, arn: &str) -> Result<Option<CertificateHandle>> {
        Ok(self.certificate_issued(arn).then(|| CertificateHandle {
            arn: arn.to_string(),
        }))
    }
}

impl DnsApi for LocalPlatform {
    async fn describe_zone(
        &self,
        zone_id: &str,
        zone_name: &str,
    ) -> Result<Option<HostedZoneHandle>> {
        let found = ZONE_ID_RE.is_match(zone_id) && ZONE_NAME_RE.is_match(zone_name);
        Ok(found.then(|| HostedZoneHandle {
            zone_id: zone_id.to_string(),
            zone_name: zone_name.trim_end_matches('.').to_string(),
        }))
    }

    async fn upsert_alias_record(
        &self,
        spec: &AliasRecordSpec,
    ) -> Result<Applied<DnsRecordHandle>> {
        self.write(|s| {
            let desired = DnsRecordHandle {
                zone_id: spec.zone_id.clone(),
                name: spec.name.clone(),
                alias_target: spec.alias_target.clone(),
            };
            let key = format!("{}|{}", spec.zone_id, spec.name);
            let change = match s.dns_records.insert(key, desired.clone()) {
                Some(previous) => compare(&previous, &desired),
                None => Change::Created,
            };
            debug!(name = %spec.name, target = %spec.alias_target, %change, "upsert alias record");
            Ok(Applied::new(desired, change))
        })
        .await
    }

    async fn delete_record(&self, zone_id: &str, name: &str) -> Result<Change> {
        self.write(|s| {
            Ok(removed(
                s.dns_records.remove(&format!("{zone_id}|{name}")).is_some(),
            ))
        })
        .await
    }
}

// ── Containers ────────────────────────────────────────────────────────────────

impl ClusterApi for LocalPlatform {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterHandle>> {
        self.read(|s| s.clusters.get(name).cloned())
    }

    async fn create_cluster(&self, name: &str, vpc_id: &str) -> Result<ClusterHandle> {
        let arn = self.arn("ecs", format!("cluster/{name}"));
        self.write(|s| {
            if s.clusters.contains_key(name) {
                return Err(PlatformError::Conflict {
                    kind: "cluster",
                    id: name.to_string(),
                    reason: "already exists".to_string(),
                }
                .into());
            }
            let cluster = ClusterHandle {
                arn,
                name: name.to_string(),
                vpc_id: vpc_id.to_string(),
            };
            s.clusters.insert(name.to_string(), cluster.clone());
            debug!(arn = %cluster.arn, "created cluster");
            Ok(cluster)
        })
        .await
    }
}

impl TaskDefinitionApi for LocalPlatform {
    async fn register_task_definition(
        &self,
        descriptor: &TaskDefinitionDescriptor,
    ) -> Result<RegisteredTaskDefinition> {
        self.write(|s| {
            Self::check_descriptor(s, descriptor)?;
            let revisions = s
                .task_definitions
                .entry(descriptor.family.clone())
                .or_default();
            let revision = u32::try_from(revisions.len() + 1).context("revision overflow")?;
            let registered = RegisteredTaskDefinition {
                task_definition_arn: self.arn(
                    "ecs",
                    format!("task-definition/{}:{revision}", descriptor.family),
                ),
                revision,
                descriptor: descriptor.clone(),
            };
            revisions.push(registered.clone());
            debug!(arn = %registered.task_definition_arn, "registered task definition");
            Ok(registered)
        })
        .await
    }

    async fn describe_task_definition(
        &self,
        arn: &str,
    ) -> Result<Option<RegisteredTaskDefinition>> {
        self.read(|s| s.task_definition(arn).cloned())
    }

    async fn list_task_definitions(&self, family: &str) -> Result<Vec<RegisteredTaskDefinition>> {
        self.read(|s| s.task_definitions.get(family).cloned().unwrap_or_default())
    }
}

impl ServiceApi for LocalPlatform {
    async fn describe_service(
        &self,
        cluster_arn: &str,
        name: &str,
    ) -> Result<Option<ServiceHandle>> {
        self.read(|s| {
            s.services
                .get(&service_key(cluster_arn, name))
                .map(|svc| svc.handle.clone())
        })
    }

    async fn upsert_service(&self, spec: &ServiceSpec) -> Result<Applied<ServiceHandle>> {
        self.write(|s| {
            let not_found = |kind: &'static str, id: &str| -> anyhow::Error {
                PlatformError::NotFound {
                    kind,
                    id: id.to_string(),
                }
                .into()
            };
            let cluster = s
                .clusters
                .values()
                .find(|c| c.arn == spec.cluster_arn)
                .ok_or_else(|| not_found("cluster", &spec.cluster_arn))?;
            let revision = s
                .task_definition(&spec.task_definition_arn)
                .ok_or_else(|| not_found("task definition", &spec.task_definition_arn))?;
            if !s
                .target_groups
                .values()
                .any(|tg| tg.handle.arn == spec.target_group_arn)
            {
                return Err(not_found("target group", &spec.target_group_arn));
            }
            s.group(&spec.security_group_id)?;
            let exposes_port = revision.descriptor.container_definitions.iter().any(|c| {
                c.name == spec.container_name
                    && c.port_mappings
                        .iter()
                        .any(|p| p.container_port == spec.container_port)
            });
            if !exposes_port {
                return Err(PlatformError::Rejected {
                    kind: "service",
                    id: spec.name.clone(),
                    reason: format!(
                        "container {} does not expose port {}",
                        spec.container_name, spec.container_port
                    ),
                }
                .into());
            }

            let key = service_key(&spec.cluster_arn, &spec.name);
            let arn = self.arn("ecs", format!("service/{}/{}", cluster.name, spec.name));
            let desired = StoredService {
                handle: ServiceHandle {
                    arn,
                    name: spec.name.clone(),
                    cluster_arn: spec.cluster_arn.clone(),
                    task_definition_arn: spec.task_definition_arn.clone(),
                    desired_count: spec.desired_count,
                    security_group_id: spec.security_group_id.clone(),
                    target_group_arn: spec.target_group_arn.clone(),
                },
                subnet_ids: spec.subnet_ids.clone(),
                container_name: spec.container_name.clone(),
                container_port: spec.container_port,
            };
            let change = match s.services.get(&key) {
                Some(existing)
                    if existing.handle == desired.handle
                        && existing.subnet_ids == desired.subnet_ids
                        && existing.container_name == desired.container_name
                        && existing.container_port == desired.container_port =>
                {
                    Change::Unchanged
                }
                Some(_) => Change::Updated,
                None => Change::Created,
            };
            let handle = desired.handle.clone();
            s.services.insert(key, desired);
            debug!(service = %handle.arn, %change, "upsert service");
            Ok(Applied::new(handle, change))
        })
        .await
    }

    async fn update_service_task_definition(
        &self,
        cluster_arn: &str,
        name: &str,
        task_definition_arn: &str,
    ) -> Result<Applied<ServiceHandle>> {
        let principal = self.principal.clone();
        self.write(|s| {
            let key = service_key(cluster_arn, name);
            if !s.services.contains_key(&key) {
                return Err(PlatformError::NotFound {
                    kind: "service",
                    id: name.to_string(),
                }
                .into());
            }
            let Some(revision) = s.task_definition(task_definition_arn) else {
                return Err(SequencingError::OverrideBeforeRegister {
                    service: name.to_string(),
                }
                .into());
            };
            for role in revision.descriptor.role_arns() {
                let grant = PassRoleGrant {
                    principal: principal.clone(),
                    role_arn: role.to_string(),
                };
                if !s.pass_role.contains(&grant) {
                    return Err(PlatformError::AccessDenied {
                        principal,
                        role_arn: role.to_string(),
                        resource: name.to_string(),
                    }
                    .into());
                }
            }
            let Some(service) = s.services.get_mut(&key) else {
                return Err(PlatformError::NotFound {
                    kind: "service",
                    id: name.to_string(),
                }
                .into());
            };
            let change = if service.handle.task_definition_arn == task_definition_arn {
                Change::Unchanged
            } else {
                service.handle.task_definition_arn = task_definition_arn.to_string();
                Change::Updated
            };
            debug!(service = name, task_definition_arn, %change, "update service task definition");
            Ok(Applied::new(service.handle.clone(), change))
        })
        .await
    }

    async fn delete_service(&self, cluster_arn: &str, name: &str) -> Result<Change> {
        self.write(|s| {
            Ok(removed(
                s.services.remove(&service_key(cluster_arn, name)).is_some(),
            ))
        })
        .await
    }
}

// ── Storage ───────────────────────────────────────────────────────────────────

impl FileSystemApi for LocalPlatform {
    async fn describe_file_system(&self, name: &str) -> Result<Option<FileSystemDescription>> {
        self.read(|s| s.file_systems.values().find(|fs| fs.name == name).cloned())
    }

    async fn create_file_system(&self, spec: &FileSystemSpec) -> Result<FileSystemDescription> {
        self.write(|s| {
            if s.file_systems.values().any(|fs| fs.name == spec.name) {
                return Err(PlatformError::Conflict {
                    kind: "file system",
                    id: spec.name.clone(),
                    reason: "already exists".to_string(),
                }
                .into());
            }
            let group = s.group(&spec.security_group_id)?;
            if group.vpc_id != spec.vpc_id {
                return Err(PlatformError::Rejected {
                    kind: "file system",
                    id: spec.name.clone(),
                    reason: format!("security group {} is in {}", group.id, group.vpc_id),
                }
                .into());
            }
            let id = s.mint_id("fs");
            let description = FileSystemDescription {
                arn: self.arn("elasticfilesystem", format!("file-system/{id}")),
                id: id.clone(),
                name: spec.name.clone(),
                vpc_id: spec.vpc_id.clone(),
                security_group_id: spec.security_group_id.clone(),
                encrypted: spec.encrypted,
                performance_mode: spec.performance_mode,
            };
            s.file_systems.insert(id, description.clone());
            debug!(id = %description.id, name = %description.name, "created file system");
            Ok(description)
        })
        .await
    }

    /// Deleting a file system removes its access points with it.
    async fn delete_file_system(&self, file_system_id: &str) -> Result<Change> {
        self.write(|s| {
            let found = s.file_systems.remove(file_system_id).is_some();
            s.access_points
                .retain(|_, ap| ap.file_system_id != file_system_id);
            Ok(removed(found))
        })
        .await
    }

    async fn describe_access_point(&self, name: &str) -> Result<Option<AccessPointHandle>> {
        self.read(|s| {
            s.access_points
                .values()
                .find(|ap| ap.handle.name == name)
                .map(|ap| ap.handle.clone())
        })
    }

    async fn create_access_point(&self, spec: &AccessPointSpec) -> Result<AccessPointHandle> {
        self.write(|s| {
            if s.access_points.values().any(|ap| ap.handle.name == spec.name) {
                return Err(PlatformError::Conflict {
                    kind: "access point",
                    id: spec.name.clone(),
                    reason: "already exists".to_string(),
                }
                .into());
            }
            if !s.file_systems.contains_key(&spec.file_system_id) {
                return Err(PlatformError::NotFound {
                    kind: "file system",
                    id: spec.file_system_id.clone(),
                }
                .into());
            }
            if !spec.root_path.starts_with('/') {
                return Err(PlatformError::Rejected {
                    kind: "access point",
                    id: spec.name.clone(),
                    reason: format!("root path {} is not absolute", spec.root_path),
                }
                .into());
            }
            let id = s.mint_id("fsap");
            let handle = AccessPointHandle {
                arn: self.arn("elasticfilesystem", format!("access-point/{id}")),
                id: id.clone(),
                name: spec.name.clone(),
                root_path: spec.root_path.clone(),
                posix: spec.posix,
            };
            s.access_points.insert(
                id,
                StoredAccessPoint {
                    handle: handle.clone(),
                    file_system_id: spec.file_system_id.clone(),
                },
            );
            debug!(id = %handle.id, uid = handle.posix.uid, gid = handle.posix.gid, "created access point");
            Ok(handle)
        })
        .await
    }

    async fn delete_access_point(&self, access_point_id: &str) -> Result<Change> {
        self.write(|s| Ok(removed(s.access_points.remove(access_point_id).is_some()))).await
    }
}

// ── Load balancing ────────────────────────────────────────────────────────────

impl LoadBalancingApi for LocalPlatform {
    async fn upsert_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
    ) -> Result<Applied<LoadBalancerHandle>> {
        self.write(|s| {
            s.group(&spec.security_group_id)?;
            if let Some(existing) = s.load_balancers.get_mut(&spec.name) {
                if existing.vpc_id != spec.vpc_id || existing.internet_facing != spec.internet_facing
                {
                    return Err(PlatformError::Conflict {
                        kind: "load balancer",
                        id: spec.name.clone(),
                        reason: "network and scheme cannot change".to_string(),
                    }
                    .into());
                }
                let change = if existing.subnet_ids == spec.subnet_ids
                    && existing.handle.security_group_id == spec.security_group_id
                {
                    Change::Unchanged
                } else {
                    existing.subnet_ids.clone_from(&spec.subnet_ids);
                    existing
                        .handle
                        .security_group_id
                        .clone_from(&spec.security_group_id);
                    Change::Updated
                };
                return Ok(Applied::new(existing.handle.clone(), change));
            }
            let id = s.mint_id("lb");
            let suffix = id.trim_start_matches("lb-");
            let handle = LoadBalancerHandle {
                arn: self.arn(
                    "elasticloadbalancing",
                    format!("loadbalancer/app/{}/{suffix}", spec.name),
                ),
                name: spec.name.clone(),
                dns_name: format!(
                    "{}-{}.{}.elb.amazonaws.com",
                    spec.name,
                    suffix.trim_start_matches('0'),
                    self.target.region
                ),
                security_group_id: spec.security_group_id.clone(),
            };
            s.load_balancers.insert(
                spec.name.clone(),
                StoredLoadBalancer {
                    handle: handle.clone(),
                    vpc_id: spec.vpc_id.clone(),
                    subnet_ids: spec.subnet_ids.clone(),
                    internet_facing: spec.internet_facing,
                },
            );
            debug!(arn = %handle.arn, "created load balancer");
            Ok(Applied::new(handle, Change::Created))
        })
        .await
    }

    async fn upsert_target_group(
        &self,
        spec: &TargetGroupSpec,
    ) -> Result<Applied<TargetGroupHandle>> {
        self.write(|s| {
            if let Some(existing) = s.target_groups.get_mut(&spec.name) {
                if existing.vpc_id != spec.vpc_id || existing.handle.port != spec.port {
                    return Err(PlatformError::Conflict {
                        kind: "target group",
                        id: spec.name.clone(),
                        reason: "network and port cannot change".to_string(),
                    }
                    .into());
                }
                let change = if existing.handle.health_check_path == spec.health_check_path {
                    Change::Unchanged
                } else {
                    existing
                        .handle
                        .health_check_path
                        .clone_from(&spec.health_check_path);
                    Change::Updated
                };
                return Ok(Applied::new(existing.handle.clone(), change));
            }
            let id = s.mint_id("tg");
            let handle = TargetGroupHandle {
                arn: self.arn(
                    "elasticloadbalancing",
                    format!("targetgroup/{}/{}", spec.name, id.trim_start_matches("tg-")),
                ),
                name: spec.name.clone(),
                port: spec.port,
                health_check_path: spec.health_check_path.clone(),
            };
            s.target_groups.insert(
                spec.name.clone(),
                StoredTargetGroup {
                    handle: handle.clone(),
                    vpc_id: spec.vpc_id.clone(),
                },
            );
            debug!(arn = %handle.arn, path = %handle.health_check_path, "created target group");
            Ok(Applied::new(handle, Change::Created))
        })
        .await
    }

    async fn upsert_listener(&self, spec: &ListenerSpec) -> Result<Applied<ListenerHandle>> {
        let certificate_ok = self.certificate_issued(&spec.certificate_arn);
        self.write(|s| {
            let Some(lb) = s
                .load_balancers
                .values()
                .find(|lb| lb.handle.arn == spec.load_balancer_arn)
            else {
                return Err(PlatformError::NotFound {
                    kind: "load balancer",
                    id: spec.load_balancer_arn.clone(),
                }
                .into());
            };
            if !s
                .target_groups
                .values()
                .any(|tg| tg.handle.arn == spec.target_group_arn)
            {
                return Err(PlatformError::NotFound {
                    kind: "target group",
                    id: spec.target_group_arn.clone(),
                }
                .into());
            }
            if !certificate_ok {
                return Err(PlatformError::Rejected {
                    kind: "listener",
                    id: format!("{}:{}", lb.handle.name, spec.port),
                    reason: format!("certificate {} is not issued", spec.certificate_arn),
                }
                .into());
            }
            let lb_name = lb.handle.name.clone();

            if let Some(existing) = s.listeners.values_mut().find(|l| {
                l.load_balancer_arn == spec.load_balancer_arn && l.handle.port == spec.port
            }) {
                let change = if existing.handle.certificate_arn == spec.certificate_arn
                    && existing.target_group_arn == spec.target_group_arn
                {
                    Change::Unchanged
                } else {
                    existing
                        .handle
                        .certificate_arn
                        .clone_from(&spec.certificate_arn);
                    existing.target_group_arn.clone_from(&spec.target_group_arn);
                    Change::Updated
                };
                return Ok(Applied::new(existing.handle.clone(), change));
            }
            let id = s.mint_id("lst");
            let handle = ListenerHandle {
                arn: self.arn(
                    "elasticloadbalancing",
                    format!("listener/app/{lb_name}/{}", id.trim_start_matches("lst-")),
                ),
                port: spec.port,
                certificate_arn: spec.certificate_arn.clone(),
            };
            s.listeners.insert(
                handle.arn.clone(),
                StoredListener {
                    handle: handle.clone(),
                    load_balancer_arn: spec.load_balancer_arn.clone(),
                    target_group_arn: spec.target_group_arn.clone(),
                },
            );
            debug!(arn = %handle.arn, port = handle.port, "created listener");
            Ok(Applied::new(handle, Change::Created))
        })
        .await
    }

    async fn describe_target_group(&self, name: &str) -> Result<Option<TargetGroupHandle>> {
        self.read(|s| s.target_groups.get(name).map(|tg| tg.handle.clone()))
    }

    async fn describe_listener(&self, arn: &str) -> Result<Option<ListenerDescription>> {
        self.read(|s| {
            s.listeners.get(arn).map(|l| ListenerDescription {
                listener: l.handle.clone(),
                load_balancer_arn: l.load_balancer_arn.clone(),
                target_group_arn: l.target_group_arn.clone(),
            })
        })
    }

    async fn delete_listener(&self, arn: &str) -> Result<Change> {
        self.write(|s| Ok(removed(s.listeners.remove(arn).is_some()))).await
    }

    async fn delete_target_group(&self, arn: &str) -> Result<Change> {
        self.write(|s| {
            let in_use = s.listeners.values().any(|l| l.target_group_arn == arn)
                || s.services.values().any(|svc| svc.handle.target_group_arn == arn);
            if in_use {
                return Err(PlatformError::Conflict {
                    kind: "target group",
                    id: arn.to_string(),
                    reason: "still in use".to_string(),
                }
                .into());
            }
            let before = s.target_groups.len();
            s.target_groups.retain(|_, tg| tg.handle.arn != arn);
            Ok(removed(s.target_groups.len() < before))
        })
        .await
    }

    /// Deleting a load balancer removes its listeners with it.
    async fn delete_load_balancer(&self, arn: &str) -> Result<Change> {
        self.write(|s| {
            let before = s.load_balancers.len();
            s.load_balancers.retain(|_, lb| lb.handle.arn != arn);
            s.listeners.retain(|_, l| l.load_balancer_arn != arn);
            Ok(removed(s.load_balancers.len() < before))
        })
        .await
    }
}

// ── Identity ──────────────────────────────────────────────────────────────────

impl IamApi for LocalPlatform {
    async fn caller_principal(&self) -> Result<String> {
        Ok(self.principal.clone())
    }

    async fn ensure_role(&self, spec: &RoleSpec) -> Result<Applied<RoleHandle>> {
        let arn = Arn::global("iam", &self.target.account, format!("role/{}", spec.name)).to_string();
        self.write(|s| {
            if let Some(existing) = s.roles.get_mut(&spec.name) {
                let change = if existing.trusted_service == spec.trusted_service {
                    Change::Unchanged
                } else {
                    existing.trusted_service.clone_from(&spec.trusted_service);
                    Change::Updated
                };
                return Ok(Applied::new(existing.handle.clone(), change));
            }
            let handle = RoleHandle {
                arn,
                name: spec.name.clone(),
            };
            s.roles.insert(
                spec.name.clone(),
                StoredRole {
                    handle: handle.clone(),
                    trusted_service: spec.trusted_service.clone(),
                },
            );
            debug!(arn = %handle.arn, "created role");
            Ok(Applied::new(handle, Change::Created))
        })
        .await
    }

    async fn delete_role(&self, name: &str) -> Result<Change> {
        self.write(|s| {
            let Some(role) = s.roles.remove(name) else {
                return Ok(Change::Unchanged);
            };
            s.pass_role.retain(|g| g.role_arn != role.handle.arn);
            Ok(Change::Deleted)
        })
        .await
    }

    async fn grant_pass_role(&self, principal: &str, role_arn: &str) -> Result<Change> {
        self.write(|s| {
            if !s.role_exists(role_arn) {
                return Err(PlatformError::NotFound {
                    kind: "role",
                    id: role_arn.to_string(),
                }
                .into());
            }
            let inserted = s.pass_role.insert(PassRoleGrant {
                principal: principal.to_string(),
                role_arn: role_arn.to_string(),
            });
            let change = if inserted {
                Change::Created
            } else {
                Change::Unchanged
            };
            debug!(principal, role_arn, %change, "grant pass-role");
            Ok(change)
        })
        .await
    }

    async fn revoke_pass_role(&self, principal: &str, role_arn: &str) -> Result<Change> {
        self.write(|s| {
            Ok(removed(s.pass_role.remove(&PassRoleGrant {
                principal: principal.to_string(),
                role_arn: role_arn.to_string(),
            })))
        })
        .await
    }

    async fn can_pass_role(&self, principal: &str, role_arn: &str) -> Result<bool> {
        self.read(|s| {
            s.pass_role.contains(&PassRoleGrant {
                principal: principal.to_string(),
                role_arn: role_arn.to_string(),
            })
        })
    }
}
