//! Command implementations

pub mod config;
pub mod deploy;
pub mod destroy;
pub mod params;
pub mod revisions;
pub mod status;
pub mod version;

use anyhow::Result;
use clap::Args;

use crate::domain::target::DeployTarget;
use crate::infra::platform::LocalPlatform;
use crate::infra::state::FileDeploymentStore;

/// Account and region a command applies to.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// 12-digit account id
    #[arg(long, env = "CISTACK_ACCOUNT")]
    pub account: String,

    /// Region name, e.g. us-east-1
    #[arg(long, env = "CISTACK_REGION")]
    pub region: String,
}

impl TargetArgs {
    /// Validate the flags into a [`DeployTarget`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTarget` for a malformed account or region.
    pub fn resolve(&self) -> Result<DeployTarget> {
        DeployTarget::new(&self.account, &self.region)
    }
}

/// Platform and deployment record store for `target`.
fn open_backends(target: &DeployTarget) -> Result<(LocalPlatform, FileDeploymentStore)> {
    Ok((
        LocalPlatform::open(target.clone())?,
        FileDeploymentStore::new()?,
    ))
}
