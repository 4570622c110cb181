//! Deploy target (account + region) and its validation.

use std::fmt;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[0-9]{12}$").expect("valid regex")
});

/// `us-east-1`, `eu-central-2`, `us-gov-west-1`, `ap-southeast-4`, ...
static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-[0-9]$").expect("valid regex")
});

/// Account and region a deployment applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployTarget {
    pub account: String,
    pub region: String,
}

impl DeployTarget {
    /// Build a validated target.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTarget` for a malformed account id or region.
    pub fn new(account: &str, region: &str) -> Result<Self> {
        if !ACCOUNT_RE.is_match(account) {
            return Err(ConfigError::InvalidTarget(format!(
                "account '{account}' must be 12 digits"
            ))
            .into());
        }
        if !REGION_RE.is_match(region) {
            return Err(ConfigError::InvalidTarget(format!(
                "region '{region}' is not a region name such as us-east-1"
            ))
            .into());
        }
        Ok(Self {
            account: account.to_string(),
            region: region.to_string(),
        })
    }

    /// File-name-safe key, e.g. `123456789012-us-east-1`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.account, self.region)
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}
