//! `cistack revisions`: list registered task definition revisions.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::config_service;
use crate::application::services::revisions::list_revisions;
use crate::commands::{TargetArgs, open_backends};

/// Arguments for the revisions command.
#[derive(Args)]
pub struct RevisionsArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Run the revisions command.
///
/// # Errors
///
/// Returns any platform or state error.
pub async fn run(app: &AppContext, args: RevisionsArgs) -> Result<ExitCode> {
    let target = args.target.resolve()?;
    let config = config_service::load_config(&app.config_store)?;
    let (platform, store) = open_backends(&target)?;
    let entries = list_revisions(&platform, &store, &config, &target).await?;
    app.renderer().render_revisions(&entries)?;
    Ok(ExitCode::SUCCESS)
}
