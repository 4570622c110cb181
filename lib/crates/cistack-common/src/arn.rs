use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Partition used for every ARN minted by this crate.
pub const PARTITION: &str = "aws";

/// Errors produced while parsing ARNs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArnError {
    #[error("'{0}' is not an ARN (expected arn:<partition>:<service>:<region>:<account>:<resource>)")]
    Malformed(String),

    #[error("'{arn}' is not a {expected} ARN")]
    WrongService { arn: String, expected: &'static str },

    #[error("'{0}' is not a task definition revision ARN")]
    NotTaskDefinition(String),
}

/// Amazon Resource Name, split into its six colon-separated components.
///
/// Only the first five separators are significant; the resource part may
/// itself contain colons (`task-definition/jenkins:3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl Arn {
    /// Build an ARN in the default partition.
    #[must_use]
    pub fn new(service: &str, region: &str, account: &str, resource: impl Into<String>) -> Self {
        Self {
            partition: PARTITION.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: resource.into(),
        }
    }

    /// Global (region-less) ARN, as used by IAM.
    #[must_use]
    pub fn global(service: &str, account: &str, resource: impl Into<String>) -> Self {
        Self::new(service, "", account, resource)
    }

    /// Parse and require a specific service component.
    pub fn parse_for(value: &str, service: &'static str) -> Result<Self, ArnError> {
        let arn: Self = value.parse()?;
        if arn.service != service {
            return Err(ArnError::WrongService {
                arn: value.to_string(),
                expected: service,
            });
        }
        Ok(arn)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(6, ':');
        let malformed = || ArnError::Malformed(s.to_string());
        if parts.next() != Some("arn") {
            return Err(malformed());
        }
        let partition = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let service = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let region = parts.next().ok_or_else(malformed)?;
        let account = parts.next().ok_or_else(malformed)?;
        let resource = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource: resource.to_string(),
        })
    }
}

impl TryFrom<String> for Arn {
    type Error = ArnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Arn> for String {
    fn from(arn: Arn) -> Self {
        arn.to_string()
    }
}

/// Family and revision number extracted from a task definition ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionRef {
    pub family: String,
    pub revision: u32,
}

impl TaskDefinitionRef {
    /// Parse `arn:aws:ecs:<region>:<account>:task-definition/<family>:<revision>`.
    pub fn from_arn(value: &str) -> Result<Self, ArnError> {
        let arn = Arn::parse_for(value, "ecs")?;
        let not_td = || ArnError::NotTaskDefinition(value.to_string());
        let rest = arn
            .resource
            .strip_prefix("task-definition/")
            .ok_or_else(not_td)?;
        let (family, revision) = rest.rsplit_once(':').ok_or_else(not_td)?;
        if family.is_empty() {
            return Err(not_td());
        }
        let revision = revision.parse::<u32>().map_err(|_| not_td())?;
        Ok(Self {
            family: family.to_string(),
            revision,
        })
    }
}
