//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod checks;
pub mod config;
pub mod error;
pub mod permissions;
pub mod record;
pub mod resources;
pub mod stages;
pub mod target;
pub mod task_definition;

pub use config::{StackConfig, validate_config_key, validate_config_value, validate_stack_config};
pub use error::{
    ConfigError, DeploymentError, DerivationError, PlatformError, SequencingError, VolumeError,
};
pub use permissions::PermissionGrant;
pub use record::{DeploymentRecord, TaskOverrideRecord};
pub use resources::{Applied, Change, ResourceChange};
pub use stages::Stage;
pub use target::DeployTarget;
