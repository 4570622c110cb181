//! Environment resolution: network, certificate and DNS zone handles.
//!
//! Read-only. Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::Result;
use cistack_common::{Arn, CertificateHandle, HostedZoneHandle, NetworkHandle};
use tracing::{debug, info};

use crate::application::ports::{CertificateApi, DnsApi, NetworkApi, ParameterStore};
use crate::domain::config::StackConfig;
use crate::domain::error::ConfigError;

/// External references every later stage builds on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub network: NetworkHandle,
    pub certificate: CertificateHandle,
    pub zone: HostedZoneHandle,
}

/// Resolve the configured parameter names into handles.
///
/// # Errors
///
/// Returns `ConfigError::MissingParameter` if a referenced parameter is not
/// set, or `ConfigError::InvalidReference` if its value is malformed or names
/// something the platform does not know.
pub async fn resolve(
    platform: &(impl ParameterStore + NetworkApi + CertificateApi + DnsApi),
    config: &StackConfig,
) -> Result<ResolvedEnvironment> {
    let network = resolve_network(platform, config).await?;
    let certificate = resolve_certificate(platform, config).await?;
    let zone = resolve_zone(platform, config).await?;
    info!(
        vpc_id = %network.vpc_id,
        certificate = %certificate.arn,
        zone = %zone.zone_name,
        "environment resolved"
    );
    Ok(ResolvedEnvironment {
        network,
        certificate,
        zone,
    })
}

async fn resolve_network(
    platform: &(impl ParameterStore + NetworkApi),
    config: &StackConfig,
) -> Result<NetworkHandle> {
    if config.network.use_default {
        debug!("using default network");
        return platform.default_network().await;
    }
    let name = &config.network.vpc_id_parameter;
    let vpc_id = require_parameter(platform, name).await?;
    if !vpc_id.starts_with("vpc-") {
        return Err(invalid(name, "network", format!("'{vpc_id}' is not a VPC id")));
    }
    platform
        .describe_network(&vpc_id)
        .await?
        .ok_or_else(|| invalid(name, "network", format!("VPC {vpc_id} does not exist")))
}

async fn resolve_certificate(
    platform: &(impl ParameterStore + CertificateApi),
    config: &StackConfig,
) -> Result<CertificateHandle> {
    let name = &config.certificate.arn_parameter;
    let value = require_parameter(platform, name).await?;
    let arn = Arn::parse_for(&value, "acm").map_err(|e| invalid(name, "certificate", e.to_string()))?;
    if !arn.resource.starts_with("certificate/") {
        return Err(invalid(name, "certificate", format!("'{value}' is not a certificate")));
    }
    platform
        .describe_certificate(&value)
        .await?
        .ok_or_else(|| invalid(name, "certificate", format!("{value} is not issued")))
}

async fn resolve_zone(
    platform: &(impl ParameterStore + DnsApi),
    config: &StackConfig,
) -> Result<HostedZoneHandle> {
    let id_name = &config.dns.zone_id_parameter;
    let zone_id = require_parameter(platform, id_name).await?;
    let zone_name = require_parameter(platform, &config.dns.zone_name_parameter).await?;
    platform
        .describe_zone(&zone_id, &zone_name)
        .await?
        .ok_or_else(|| {
            invalid(
                id_name,
                "hosted zone",
                format!("no zone {zone_id} named {zone_name}"),
            )
        })
}

/// Read a parameter that must be set.
///
/// # Errors
///
/// Returns `ConfigError::MissingParameter` if it is absent or empty.
pub async fn require_parameter(platform: &impl ParameterStore, name: &str) -> Result<String> {
    match platform.get_parameter(name).await? {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingParameter {
            name: name.to_string(),
        }
        .into()),
    }
}

fn invalid(name: &str, kind: &'static str, reason: String) -> anyhow::Error {
    ConfigError::InvalidReference {
        name: name.to_string(),
        kind,
        reason,
    }
    .into()
}
