//! CLI argument parsing for the tourney daemon.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Tournament scheduler daemon
///
/// Runs the tournament status update and reminder jobs on their cron schedules.
#[derive(Parser, Debug)]
#[command(name = "tourney-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default in the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler and run until SIGINT/SIGTERM
    Start {
        /// Override the tournament fixture file
        #[arg(long)]
        seed_path: Option<String>,
    },

    /// List registered jobs as JSON
    Jobs,

    /// Execute one job immediately and print its execution record
    Run {
        /// Job id (e.g. tournament-status-update)
        job_id: String,

        /// Metadata passed to the handler, repeatable
        #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair. The value may itself contain `=`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
