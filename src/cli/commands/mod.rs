//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod daemon;
mod ingest;
mod jobs;
mod status;
mod targets;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::context::AppContext;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Scheduled course catalog ingestion from university websites")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "COURSEHARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite catalog path (overrides the config file)
    #[arg(long, global = true, env = "COURSEHARVEST_DATABASE")]
    database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler with the default jobs until interrupted
    Daemon,

    /// Run one full ingestion pass in the foreground
    Ingest,

    /// List the default jobs and when they fire next
    Jobs,

    /// Run a registered job once
    RunJob {
        /// Job name (see `harvest jobs`)
        name: String,
    },

    /// List configured targets and check their selectors
    Targets,

    /// Show catalog statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show system health
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

async fn load_config(path: Option<PathBuf>, database: Option<String>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from_path(&path).await?,
        None => Config::load().await?,
    };
    if database.is_some() {
        config.database.path = database;
    }
    Ok(config)
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config, cli.database)
        .await
        .context("failed to load configuration")?;

    if let Commands::Targets = cli.command {
        return targets::cmd_targets(&config);
    }

    let ctx = AppContext::from_config(config)?;
    match cli.command {
        Commands::Daemon => daemon::cmd_daemon(&ctx).await,
        Commands::Ingest => ingest::cmd_ingest(&ctx).await,
        Commands::Jobs => jobs::cmd_jobs(&ctx).await,
        Commands::RunJob { name } => jobs::cmd_run_job(&ctx, &name).await,
        Commands::Targets => targets::cmd_targets(&ctx.config),
        Commands::Stats { json } => status::cmd_stats(&ctx, json).await,
        Commands::Health { json } => status::cmd_health(&ctx, json).await,
    }
}
