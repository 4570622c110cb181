//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the platform adapter, the
//! deployment record store, and the YAML configuration store.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod config;
pub mod fs;
pub mod platform;
pub mod state;
