//! `cistack params`: read and seed the parameter store.
//!
//! The VPC id, certificate ARN and hosted zone are looked up from parameters
//! at deploy time; this is how an operator provides them.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::services::params;
use crate::commands::{TargetArgs, open_backends};

/// Arguments for the params command.
#[derive(Args)]
pub struct ParamsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: ParamsCommand,
}

/// Params subcommands.
#[derive(Subcommand)]
pub enum ParamsCommand {
    /// Print a parameter value
    Get {
        /// Parameter name, e.g. /cistack/network/vpc-id
        name: String,
    },
    /// Create or overwrite a parameter
    Set {
        /// Parameter name, e.g. /cistack/network/vpc-id
        name: String,
        /// Parameter value
        value: String,
    },
    /// List parameters under a prefix
    List {
        /// Name prefix
        #[arg(default_value = "/")]
        prefix: String,
    },
}

/// Run the params command.
///
/// # Errors
///
/// Returns `ConfigError::MissingParameter` for an unset parameter on `get`,
/// `ConfigError::InvalidValue` for a malformed name on `set`.
pub async fn run(app: &AppContext, args: ParamsArgs) -> Result<ExitCode> {
    let target = args.target.resolve()?;
    let (platform, _) = open_backends(&target)?;
    let renderer = app.renderer();
    match args.command {
        ParamsCommand::Get { name } => {
            let value = params::get(&platform, &name).await?;
            renderer.render_parameter(&name, &value)?;
        }
        ParamsCommand::Set { name, value } => {
            let change = params::set(&platform, &name, &value).await?;
            renderer.render_parameter_set(&name, change)?;
        }
        ParamsCommand::List { prefix } => {
            let list = params::list(&platform, &prefix).await?;
            renderer.render_parameters(&list)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
