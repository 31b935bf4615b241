//! Tourney daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `config`: Layered settings (defaults, files, environment)
//! - `commands`: Command implementations (start, jobs, run)

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands};
pub use commands::{
    build_engine, build_store, job_summaries, list_jobs, load_settings, metadata_from_pairs,
    run_job, start_daemon, JobSummary,
};
pub use config::Settings;
