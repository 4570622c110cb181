//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Configuration and external-reference errors. Terminal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },

    #[error("Parameter '{name}' is not set. Seed it with: cistack params set {name} <value>")]
    MissingParameter { name: String },

    #[error("Parameter '{name}' holds an invalid {kind} reference: {reason}")]
    InvalidReference {
        name: String,
        kind: &'static str,
        reason: String,
    },

    #[error("Invalid deploy target: {0}")]
    InvalidTarget(String),

    #[error("Unsupported sizing: {cpu} CPU units with {memory} MiB (valid memory for {cpu}: {valid})")]
    UnsupportedSizing { cpu: u32, memory: u32, valid: String },
}

// ── Platform errors ───────────────────────────────────────────────────────────

/// Rejections returned by the cloud platform, naming the failing resource.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} '{id}' conflicts with an existing resource: {reason}")]
    Conflict {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("{kind} '{id}' rejected: {reason}")]
    Rejected {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("{principal} is not allowed to pass role {role_arn} (needed by {resource})")]
    AccessDenied {
        principal: String,
        role_arn: String,
        resource: String,
    },
}

// ── Sequencing errors ─────────────────────────────────────────────────────────

/// Ordering violations inside the task definition override sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequencingError {
    #[error("Task definition '{family}' has no execution role; refusing to grant or override")]
    MissingExecutionRole { family: String },

    #[error("Task definition '{family}' has no task role; refusing to grant or override")]
    MissingTaskRole { family: String },

    #[error("Override requested for {service} before a revision was registered")]
    OverrideBeforeRegister { service: String },
}

// ── Derivation errors ─────────────────────────────────────────────────────────

/// The placeholder task definition cannot be turned into the corrected one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("Placeholder '{family}' has {count} containers; exactly one is supported")]
    ContainerCount { family: String, count: usize },

    #[error("Placeholder '{family}' already declares volume '{volume}'")]
    VolumeAlreadyDeclared { family: String, volume: String },

    #[error("Derived task definition diverges from the placeholder: {0}")]
    Diverged(String),
}

// ── Volume errors ─────────────────────────────────────────────────────────────

/// Destructive volume changes that need operator consent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VolumeError {
    #[error(
        "{resource} must be replaced ({reason}). Replacement destroys and recreates it and may lose data.\n\
Re-run interactively to confirm, or set CISTACK_ALLOW_REPLACEMENT=1."
    )]
    ReplacementRequired { resource: String, reason: String },
}

// ── Deployment errors ─────────────────────────────────────────────────────────

/// Errors about the persisted deployment itself.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("No deployment recorded for {target}. Run 'cistack deploy' first.")]
    NotDeployed { target: String },

    #[error("Deployment record belongs to stack '{recorded}', configuration names '{configured}'")]
    StackMismatch { recorded: String, configured: String },

    #[error("Stage dependencies form a cycle")]
    CyclicStages,

    #[error("Stage '{stage}' has not produced its output yet")]
    StageNotReady { stage: String },
}

/// Stable machine-readable code for `--json` error output.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<ConfigError>().is_some() {
        "CONFIG_ERROR"
    } else if err.downcast_ref::<PlatformError>().is_some() {
        "PLATFORM_REJECTED"
    } else if err.downcast_ref::<SequencingError>().is_some() {
        "SEQUENCING_ERROR"
    } else if err.downcast_ref::<DerivationError>().is_some() {
        "DERIVATION_ERROR"
    } else if err.downcast_ref::<VolumeError>().is_some() {
        "REPLACEMENT_REQUIRED"
    } else if err.downcast_ref::<DeploymentError>().is_some() {
        "DEPLOYMENT_ERROR"
    } else {
        "ERROR"
    }
}
