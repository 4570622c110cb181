//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Jenkins on a managed container platform, with a durable home volume
#[derive(Parser)]
#[command(
    name = "cistack",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR", value_parser = clap::builder::FalseyValueParser::new())]
    pub no_color: bool,

    /// Answer prompts with their default
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision or converge the stack
    Deploy(commands::deploy::DeployArgs),

    /// Tear the stack down (keeps the cluster and, by default, the volume)
    Destroy(commands::destroy::DestroyArgs),

    /// Verify the deployed stack
    Status(commands::status::StatusArgs),

    /// List registered task definition revisions
    Revisions(commands::revisions::RevisionsArgs),

    /// Read and seed parameters
    Params(commands::params::ParamsArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        });

        match command {
            Command::Deploy(args) => commands::deploy::run(&app, args).await,
            Command::Destroy(args) => commands::destroy::run(&app, args).await,
            Command::Status(args) => commands::status::run(&app, args).await,
            Command::Revisions(args) => commands::revisions::run(&app, args).await,
            Command::Params(args) => commands::params::run(&app, args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
