//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed object to
//! stdout. Failures use the error object from [`format_error`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::services::deploy::DeployReport;
use crate::application::services::destroy::DestroyReport;
use crate::application::services::revisions::RevisionEntry;
use crate::domain::checks::StatusReport;
use crate::domain::config::StackConfig;
use crate::domain::resources::Change;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}

#[derive(Serialize)]
struct DeployJson<'a> {
    #[serde(flatten)]
    report: &'a DeployReport,
    noop: bool,
}

#[derive(Serialize)]
struct StatusJson<'a> {
    #[serde(flatten)]
    report: &'a StatusReport,
    healthy: bool,
}

#[derive(Serialize)]
struct ParameterJson<'a> {
    name: &'a str,
    value: &'a str,
}

/// Renders command results as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_deploy(&self, report: &DeployReport) -> Result<()> {
        print(&DeployJson {
            report,
            noop: report.is_noop(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_destroy(&self, report: &DestroyReport) -> Result<()> {
        print(report)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_status(&self, report: &StatusReport) -> Result<()> {
        print(&StatusJson {
            report,
            healthy: report.is_healthy(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_revisions(&self, entries: &[RevisionEntry]) -> Result<()> {
        print(&serde_json::json!({ "revisions": entries }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_parameter(&self, name: &str, value: &str) -> Result<()> {
        print(&ParameterJson { name, value })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_parameter_set(&self, name: &str, change: Change) -> Result<()> {
        print(&serde_json::json!({ "name": name, "change": change }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_parameters(&self, parameters: &[(String, String)]) -> Result<()> {
        let list: Vec<ParameterJson<'_>> = parameters
            .iter()
            .map(|(name, value)| ParameterJson { name, value })
            .collect();
        print(&serde_json::json!({ "parameters": list }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &StackConfig, path: &Path) -> Result<()> {
        print(&serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        print(&serde_json::json!({ "version": version }))
    }
}
