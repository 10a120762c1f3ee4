//! taskswarm CLI: the main entry point.
//!
//! Commands:
//! - `run`    : Execute a pipeline of tasks against the LLM
//! - `check`  : Validate a pipeline file
//! - `config` : Print configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "taskswarm",
    about = "taskswarm: streaming LLM task orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline file
    Run {
        /// Path to the pipeline TOML
        pipeline: PathBuf,

        /// Set a variable (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = taskswarm::pipeline::parse_var)]
        vars: Vec<(String, String)>,

        /// Print execution events as JSON lines instead of text
        #[arg(long)]
        events: bool,
    },

    /// Validate a pipeline file and list its tasks
    Check {
        /// Path to the pipeline TOML
        pipeline: PathBuf,
    },

    /// Print the default configuration
    Config {
        /// Show the effective configuration instead
        #[arg(long)]
        current: bool,

        /// Only print the config file path
        #[arg(long, conflicts_with = "current")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for model output
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run {
            pipeline,
            vars,
            events,
        } => commands::run::run(&pipeline, vars, events).await?,
        Commands::Check { pipeline } => commands::check::run(&pipeline).await?,
        Commands::Config { current, path } => {
            if path {
                commands::config_cmd::path().await?
            } else if current {
                commands::config_cmd::show_current().await?
            } else {
                commands::config_cmd::show_default().await?
            }
        }
    }

    Ok(())
}
