//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`; never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod cluster;
pub mod config_service;
pub mod deploy;
pub mod destroy;
pub mod environment;
pub mod params;
pub mod revisions;
pub mod service_topology;
pub mod status;
pub mod task_override;
pub mod volume;
