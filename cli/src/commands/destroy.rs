//! `cistack destroy`: tear the stack down in reverse stage order.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::destroy::{DestroyOptions, destroy};
use crate::commands::{TargetArgs, open_backends};
use crate::output::TerminalReporter;

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Also delete the file system holding the Jenkins home (irreversible)
    #[arg(long)]
    pub purge_volume: bool,
}

/// Run the destroy command.
///
/// # Errors
///
/// Returns `DeploymentError::NotDeployed` when nothing is recorded, or the
/// first platform error.
pub async fn run(app: &AppContext, args: DestroyArgs) -> Result<ExitCode> {
    let target = args.target.resolve()?;

    let prompt = if args.purge_volume {
        format!("Destroy the stack on {target} and delete the Jenkins home?")
    } else {
        format!("Destroy the stack on {target}? The Jenkins home is kept.")
    };
    if !app.confirm(&prompt, true)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let (platform, store) = open_backends(&target)?;
    let reporter = TerminalReporter::new(&app.output);
    let options = DestroyOptions {
        purge_volume: args.purge_volume,
    };
    let report = destroy(&platform, &store, &target, options, &reporter).await?;
    app.renderer().render_destroy(&report)?;
    Ok(ExitCode::SUCCESS)
}
