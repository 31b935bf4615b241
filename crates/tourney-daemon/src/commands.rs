//! Command implementations for the tourney daemon.
//!
//! Handles:
//! - start: load config, build the engine, run until SIGINT/SIGTERM
//! - jobs: print the registered jobs
//! - run: execute one job now and print its record

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use tourney_jobs::{
    register_reminder_job, register_tournament_lifecycle_job, InMemoryTournamentStore,
    TournamentStore,
};
use tourney_scheduler::{shutdown_signal, Metadata, SchedulerConfig, SchedulerService};

use crate::config::Settings;

/// One line of `tourney-daemon jobs` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub next_execution_time: Option<DateTime<Utc>>,
}

/// Load settings and apply CLI overrides.
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    seed_path_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(seed_path) = seed_path_override {
        settings.seed_path = Some(seed_path.to_string());
    }
    Ok(settings)
}

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// machine readable.
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Build the tournament store, seeded from `seed_path` if set.
pub fn build_store(settings: &Settings) -> Result<Arc<InMemoryTournamentStore>> {
    let store = match settings.expanded_seed_path() {
        Some(path) => {
            info!("Seeding tournament store from {:?}", path);
            InMemoryTournamentStore::load(&path)
                .with_context(|| format!("Failed to load seed file {:?}", path))?
        }
        None => InMemoryTournamentStore::new(),
    };
    Ok(Arc::new(store))
}

/// Create the scheduler and register the tournament jobs.
pub async fn build_engine(
    settings: &Settings,
    scheduler_config: SchedulerConfig,
    store: Arc<dyn TournamentStore>,
) -> Result<Arc<SchedulerService>> {
    let scheduler = SchedulerService::new(scheduler_config)
        .await
        .context("Failed to create scheduler")?;

    register_tournament_lifecycle_job(&scheduler, store.clone(), &settings.lifecycle_job)
        .await
        .context("Failed to register tournament status update job")?;
    register_reminder_job(&scheduler, store, &settings.reminder_job)
        .await
        .context("Failed to register reminder job")?;

    Ok(Arc::new(scheduler))
}

/// Summaries of every registered job, sorted by id.
pub fn job_summaries(scheduler: &SchedulerService) -> Vec<JobSummary> {
    scheduler
        .get_all_jobs()
        .into_iter()
        .map(|job| JobSummary {
            id: job.definition.id,
            name: job.definition.name,
            schedule: job.definition.schedule,
            enabled: job.definition.enabled,
            next_execution_time: job.next_execution_time,
        })
        .collect()
}

/// Convert `--meta` pairs into handler metadata.
pub fn metadata_from_pairs(pairs: Vec<(String, String)>) -> Metadata {
    pairs
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect()
}

/// Start the daemon and block until SIGINT/SIGTERM.
///
/// The daemon owns signal handling so that it returns only after the
/// engine has drained in-flight executions.
pub async fn start_daemon(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    seed_path_override: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override, seed_path_override)?;
    init_logging(&settings.log_level)?;

    info!("Tourney daemon starting...");
    info!("Configuration:");
    info!("  Log level: {}", settings.log_level);
    info!("  Status update cron: {}", settings.lifecycle_job.cron);
    info!("  Reminder cron: {}", settings.reminder_job.cron);
    info!("  History capacity: {}", settings.scheduler.history_capacity);

    let store = build_store(&settings)?;
    let scheduler_config = SchedulerConfig {
        install_signal_handlers: false,
        ..settings.scheduler.clone()
    };
    let scheduler = build_engine(&settings, scheduler_config, store).await?;

    scheduler
        .initialize()
        .await
        .context("Failed to start scheduler")?;

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = scheduler.wait_for_shutdown() => {}
    }

    scheduler.shutdown().await;
    info!("Tourney daemon stopped");
    Ok(())
}

/// Print every registered job as JSON.
pub async fn list_jobs(config_path: Option<&str>, log_level_override: Option<&str>) -> Result<()> {
    let settings = load_settings(config_path, log_level_override, None)?;
    init_logging(&settings.log_level)?;

    let store = build_store(&settings)?;
    let scheduler = build_engine(&settings, SchedulerConfig::detached(), store).await?;

    let summaries = job_summaries(&scheduler);
    scheduler.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

/// Execute one job immediately and print its execution record as JSON.
///
/// # Errors
///
/// Fails on an unknown job id. A failed execution is still printed and is
/// not an error.
pub async fn run_job(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    job_id: &str,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override, None)?;
    init_logging(&settings.log_level)?;

    let store = build_store(&settings)?;
    let scheduler_config = SchedulerConfig {
        install_signal_handlers: false,
        ..settings.scheduler.clone()
    };
    let scheduler = build_engine(&settings, scheduler_config, store).await?;
    scheduler
        .initialize()
        .await
        .context("Failed to start scheduler")?;

    let result = scheduler
        .execute_job(job_id, metadata_from_pairs(meta))
        .await;
    scheduler.shutdown().await;

    let record = result.with_context(|| format!("Cannot run job '{}'", job_id))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
