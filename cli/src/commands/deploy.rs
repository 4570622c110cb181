//! `cistack deploy`: provision or converge the stack.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::config_service;
use crate::application::services::deploy::{DeployOptions, deploy};
use crate::commands::{TargetArgs, open_backends};
use crate::domain::error::VolumeError;
use crate::output::TerminalReporter;

/// Arguments for the deploy command.
#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Run the deploy command.
///
/// # Errors
///
/// Returns the first stage error, or `VolumeError::ReplacementRequired` when
/// a destructive volume change is declined.
pub async fn run(app: &AppContext, args: DeployArgs) -> Result<ExitCode> {
    let target = args.target.resolve()?;
    let config = config_service::load_config(&app.config_store)?;
    let (platform, store) = open_backends(&target)?;
    let reporter = TerminalReporter::new(&app.output);

    app.output.header(&format!("Deploying {} to {target}", config.stack_name));

    let options = DeployOptions {
        allow_replacement: app.allow_replacement,
    };
    let report = match deploy(&platform, &store, &config, &target, options, &reporter).await {
        Err(e) if e.downcast_ref::<VolumeError>().is_some() => {
            if app.non_interactive {
                return Err(e);
            }
            app.output.warn(&e.to_string());
            if !app.confirm("Replace it now?", false)? {
                return Err(e);
            }
            let options = DeployOptions {
                allow_replacement: true,
            };
            deploy(&platform, &store, &config, &target, options, &reporter).await?
        }
        other => other?,
    };

    app.renderer().render_deploy(&report)?;
    Ok(ExitCode::SUCCESS)
}
