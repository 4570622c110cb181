//! Unit tests for the cistack CLI
//!
//! Services run against the in-memory platform; nothing touches the disk
//! except the architecture scans.

mod architecture;
mod destroy_service;
mod params_config;
mod property_tests;
mod revisions_service;
mod status_service;
mod task_override;
