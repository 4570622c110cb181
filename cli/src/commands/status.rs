//! `cistack status`: verify the deployed stack against its invariants.
//!
//! Exits non-zero when any check fails, so it can gate a pipeline.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::config_service;
use crate::application::services::status::gather_status;
use crate::commands::{TargetArgs, open_backends};
use crate::output::progress;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Run the status command.
///
/// # Errors
///
/// Returns `DeploymentError::NotDeployed` when nothing is recorded, or any
/// platform error raised while observing.
pub async fn run(app: &AppContext, args: StatusArgs) -> Result<ExitCode> {
    let target = args.target.resolve()?;
    let config = config_service::load_config(&app.config_store)?;
    let (platform, store) = open_backends(&target)?;

    let pb = app
        .output
        .show_progress()
        .then(|| progress::spinner("Checking stack..."));
    let result = gather_status(&platform, &store, &config, &target).await;
    if let Some(pb) = &pb {
        progress::finish_clear(pb);
    }
    let report = result?;

    app.renderer().render_status(&report)?;
    if report.is_healthy() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
