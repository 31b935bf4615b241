//! Tourney Daemon
//!
//! Runs the tournament status update and reminder jobs on their schedules.
//!
//! # Usage
//!
//! ```bash
//! tourney-daemon start [--seed-path PATH]
//! tourney-daemon jobs
//! tourney-daemon run <JOB_ID> [--meta KEY=VALUE]...
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/tourney-scheduler/config.toml)
//! 3. `--config` file
//! 4. Environment variables (TOURNEY_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use tourney_daemon::{list_jobs, run_job, start_daemon, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { seed_path } => {
            start_daemon(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                seed_path.as_deref(),
            )
            .await?;
        }
        Commands::Jobs => {
            list_jobs(cli.config.as_deref(), cli.log_level.as_deref()).await?;
        }
        Commands::Run { job_id, meta } => {
            run_job(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                &job_id,
                meta,
            )
            .await?;
        }
    }

    Ok(())
}
