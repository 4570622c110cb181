//! Domain types and validators for the stack configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::sync::LazyLock;

use anyhow::Result;
use cistack_common::PosixIdentity;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "stack_name",
    "network.use_default",
    "network.vpc_id_parameter",
    "certificate.arn_parameter",
    "dns.zone_id_parameter",
    "dns.zone_name_parameter",
    "dns.subdomain",
    "cluster.name",
    "cluster.arn_parameter",
    "cluster.name_parameter",
    "service.image",
    "service.cpu",
    "service.memory",
    "service.container_port",
    "service.desired_count",
    "volume.uid",
    "volume.gid",
    "volume.permissions",
];

/// Fargate CPU units and the memory sizes (MiB) each one accepts.
pub const FARGATE_CPU_UNITS: &[u32] = &[256, 512, 1024, 2048, 4096];

/// Name of the single container the service pattern creates.
pub const CONTAINER_NAME: &str = "web";

/// Resource names: letters, digits and hyphens, starting with a letter.
static RESOURCE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]{0,31}$").expect("valid regex")
});

/// Parameter names are absolute, slash-separated paths.
static PARAMETER_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(/[a-zA-Z0-9_.-]+)+$").expect("valid regex")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.cistack/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Prefix for every resource the stack creates.
    pub stack_name: String,
    pub network: NetworkConfig,
    pub certificate: CertificateConfig,
    pub dns: DnsConfig,
    pub cluster: ClusterConfig,
    pub service: ServiceConfig,
    pub volume: VolumeConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "jenkins".to_string(),
            network: NetworkConfig::default(),
            certificate: CertificateConfig::default(),
            dns: DnsConfig::default(),
            cluster: ClusterConfig::default(),
            service: ServiceConfig::default(),
            volume: VolumeConfig::default(),
        }
    }
}

/// Which VPC to deploy into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Use the account's default VPC instead of the parameter below.
    pub use_default: bool,
    pub vpc_id_parameter: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_default: false,
            vpc_id_parameter: "/cistack/network/vpc-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Parameter holding the wildcard certificate ARN.
    pub arn_parameter: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            arn_parameter: "/cistack/certificate/arn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    pub zone_id_parameter: String,
    pub zone_name_parameter: String,
    /// Record created in the zone, e.g. `jenkins` → `jenkins.example.com`.
    pub subdomain: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            zone_id_parameter: "/cistack/dns/zone-id".to_string(),
            zone_name_parameter: "/cistack/dns/zone-name".to_string(),
            subdomain: "jenkins".to_string(),
        }
    }
}

/// Cluster name and where its identity is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub name: String,
    pub arn_parameter: String,
    pub name_parameter: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "ci-cluster".to_string(),
            arn_parameter: "/cistack/cluster/arn".to_string(),
            name_parameter: "/cistack/cluster/name".to_string(),
        }
    }
}

/// Container image and sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub image: String,
    /// CPU units (1024 = one vCPU).
    pub cpu: u32,
    /// Memory limit in MiB.
    pub memory: u32,
    pub container_port: u16,
    pub desired_count: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            image: "jenkins/jenkins:lts".to_string(),
            cpu: 256,
            memory: 1024,
            container_port: 8080,
            desired_count: 1,
        }
    }
}

/// POSIX identity shared by the access point and the container user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VolumeConfig {
    pub posix: PosixIdentity,
}

// ── Derived resource names ───────────────────────────────────────────────────

impl StackConfig {
    #[must_use]
    pub fn file_system_name(&self) -> String {
        format!("{}-home", self.stack_name)
    }

    #[must_use]
    pub fn access_point_name(&self) -> String {
        format!("{}-home-ap", self.stack_name)
    }

    #[must_use]
    pub fn volume_security_group_name(&self) -> String {
        format!("{}-efs-sg", self.stack_name)
    }

    #[must_use]
    pub fn service_security_group_name(&self) -> String {
        format!("{}-service-sg", self.stack_name)
    }

    #[must_use]
    pub fn load_balancer_security_group_name(&self) -> String {
        format!("{}-lb-sg", self.stack_name)
    }

    #[must_use]
    pub fn load_balancer_name(&self) -> String {
        format!("{}-alb", self.stack_name)
    }

    /// Target groups cannot change port, so the port is part of the name and
    /// a new port gets a new group.
    #[must_use]
    pub fn target_group_name(&self) -> String {
        format!("{}-tg-{}", self.stack_name, self.service.container_port)
    }

    #[must_use]
    pub fn service_name(&self) -> String {
        format!("{}-service", self.stack_name)
    }

    #[must_use]
    pub fn task_family(&self) -> String {
        format!("{}-task", self.stack_name)
    }

    #[must_use]
    pub fn execution_role_name(&self) -> String {
        format!("{}-execution-role", self.stack_name)
    }

    #[must_use]
    pub fn task_role_name(&self) -> String {
        format!("{}-task-role", self.stack_name)
    }

    #[must_use]
    pub fn log_group(&self) -> String {
        format!("/cistack/{}", self.stack_name)
    }

    /// Fully qualified DNS name of the service record.
    #[must_use]
    pub fn record_name(&self, zone_name: &str) -> String {
        format!("{}.{}", self.dns.subdomain, zone_name.trim_end_matches('.'))
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Memory sizes Fargate accepts for the given CPU units, or `None` for an
/// unsupported CPU value.
#[must_use]
pub fn valid_memory_for_cpu(cpu: u32) -> Option<Vec<u32>> {
    let (min, max) = match cpu {
        256 => return Some(vec![512, 1024, 2048]),
        512 => (1024, 4096),
        1024 => (2048, 8192),
        2048 => (4096, 16384),
        4096 => (8192, 30720),
        _ => return None,
    };
    Some((min..=max).step_by(1024).collect())
}

/// Validates a CPU/memory combination.
///
/// # Errors
///
/// Returns `ConfigError::UnsupportedSizing` for combinations Fargate rejects.
pub fn validate_sizing(cpu: u32, memory: u32) -> Result<()> {
    let Some(valid) = valid_memory_for_cpu(cpu) else {
        return Err(ConfigError::InvalidValue {
            key: "service.cpu".to_string(),
            value: cpu.to_string(),
            valid: join(FARGATE_CPU_UNITS),
        }
        .into());
    };
    if !valid.contains(&memory) {
        return Err(ConfigError::UnsupportedSizing {
            cpu,
            memory,
            valid: join(&valid),
        }
        .into());
    }
    Ok(())
}

/// Validates a whole configuration before any platform call is made.
///
/// # Errors
///
/// Returns the first `ConfigError` found.
pub fn validate_stack_config(config: &StackConfig) -> Result<()> {
    validate_config_value("stack_name", &config.stack_name)?;
    validate_config_value("cluster.name", &config.cluster.name)?;
    validate_config_value("dns.subdomain", &config.dns.subdomain)?;
    for (key, value) in [
        ("network.vpc_id_parameter", &config.network.vpc_id_parameter),
        ("certificate.arn_parameter", &config.certificate.arn_parameter),
        ("dns.zone_id_parameter", &config.dns.zone_id_parameter),
        ("dns.zone_name_parameter", &config.dns.zone_name_parameter),
        ("cluster.arn_parameter", &config.cluster.arn_parameter),
        ("cluster.name_parameter", &config.cluster.name_parameter),
    ] {
        validate_config_value(key, value)?;
    }
    validate_config_value("service.image", &config.service.image)?;
    validate_config_value("service.container_port", &config.service.container_port.to_string())?;
    validate_config_value("service.desired_count", &config.service.desired_count.to_string())?;
    validate_config_value(
        "volume.permissions",
        &config.volume.posix.permissions_octal(),
    )?;
    validate_sizing(config.service.cpu, config.service.memory)
}

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// Cross-field rules (CPU/memory pairs) are checked by
/// [`validate_stack_config`] once the value has been applied.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| -> anyhow::Error {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            valid: valid.to_string(),
        }
        .into()
    };
    match key {
        "stack_name" | "cluster.name" | "dns.subdomain" => {
            if !RESOURCE_NAME_RE.is_match(value) {
                return Err(invalid("letters, digits and '-', starting with a letter, max 32"));
            }
        }
        "network.vpc_id_parameter"
        | "certificate.arn_parameter"
        | "dns.zone_id_parameter"
        | "dns.zone_name_parameter"
        | "cluster.arn_parameter"
        | "cluster.name_parameter" => {
            if !PARAMETER_NAME_RE.is_match(value) {
                return Err(invalid("an absolute parameter path such as /cistack/network/vpc-id"));
            }
        }
        "network.use_default" => {
            value.parse::<bool>().map_err(|_| invalid("true, false"))?;
        }
        "service.image" => {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(invalid("an image reference such as jenkins/jenkins:lts"));
            }
        }
        "service.cpu" => {
            let cpu = value
                .parse::<u32>()
                .map_err(|_| invalid(&join(FARGATE_CPU_UNITS)))?;
            if valid_memory_for_cpu(cpu).is_none() {
                return Err(invalid(&join(FARGATE_CPU_UNITS)));
            }
        }
        "service.memory" => {
            value
                .parse::<u32>()
                .map_err(|_| invalid("memory in MiB"))?;
        }
        "service.container_port" => {
            let port = value.parse::<u16>().map_err(|_| invalid("1-65535"))?;
            if port == 0 {
                return Err(invalid("1-65535"));
            }
        }
        "service.desired_count" => {
            value.parse::<u32>().map_err(|_| invalid("0 or more"))?;
        }
        "volume.uid" | "volume.gid" => {
            value.parse::<u32>().map_err(|_| invalid("a numeric id"))?;
        }
        "volume.permissions" => {
            let bits = u32::from_str_radix(value, 8).map_err(|_| invalid("octal bits such as 777"))?;
            if bits > 0o7777 {
                return Err(invalid("octal bits such as 777"));
            }
        }
        _ => validate_config_key(key)?,
    }
    Ok(())
}

/// Validates a parameter store name such as `/cistack/network/vpc-id`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if the name is not an absolute path.
pub fn validate_parameter_name(name: &str) -> Result<()> {
    if PARAMETER_NAME_RE.is_match(name) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        key: "parameter name".to_string(),
        value: name.to_string(),
        valid: "an absolute path such as /cistack/network/vpc-id".to_string(),
    }
    .into())
}

/// Apply a validated `key = value` pair to the configuration.
///
/// # Errors
///
/// Returns an error if the key is unknown or the value invalid.
pub fn apply_config_value(config: &mut StackConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;
    validate_config_value(key, value)?;
    let text = value.to_string();
    // Validated above; numeric parses cannot fail here.
    match key {
        "stack_name" => config.stack_name = text,
        "network.use_default" => config.network.use_default = value.parse()?,
        "network.vpc_id_parameter" => config.network.vpc_id_parameter = text,
        "certificate.arn_parameter" => config.certificate.arn_parameter = text,
        "dns.zone_id_parameter" => config.dns.zone_id_parameter = text,
        "dns.zone_name_parameter" => config.dns.zone_name_parameter = text,
        "dns.subdomain" => config.dns.subdomain = text,
        "cluster.name" => config.cluster.name = text,
        "cluster.arn_parameter" => config.cluster.arn_parameter = text,
        "cluster.name_parameter" => config.cluster.name_parameter = text,
        "service.image" => config.service.image = text,
        "service.cpu" => config.service.cpu = value.parse()?,
        "service.memory" => config.service.memory = value.parse()?,
        "service.container_port" => config.service.container_port = value.parse()?,
        "service.desired_count" => config.service.desired_count = value.parse()?,
        "volume.uid" => config.volume.posix.uid = value.parse()?,
        "volume.gid" => config.volume.posix.gid = value.parse()?,
        "volume.permissions" => config.volume.posix.permissions = u32::from_str_radix(value, 8)?,
        _ => validate_config_key(key)?,
    }
    Ok(())
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Unit tests ───────────────────────────────────────────────────────────────
