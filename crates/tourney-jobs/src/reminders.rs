//! Tournament reminder job.
//!
//! Two kinds of reminder, each at most once per user, tournament and UTC day:
//! - daily: joined participants of running tournaments who have not logged
//!   a score today
//! - upcoming: everyone involved in a pending tournament that starts within
//!   the configured window

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tourney_scheduler::{
    validate_cron_expression, ExecutionContext, ExecutionOutcome, JobDefinition, JobHandler,
    SchedulerError, SchedulerService,
};

use crate::error::StoreError;
use crate::lifecycle::{default_enabled, default_timeout_secs};
use crate::notify::notify_once;
use crate::store::TournamentStore;
use crate::types::{NotificationKind, TournamentStatus};

/// Job id of the reminder job.
pub const REMINDER_JOB_ID: &str = "tournament-reminders";

/// Configuration for the reminder job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderJobConfig {
    /// Cron expression (default: "0 9 * * *" = 9 AM UTC daily)
    #[serde(default = "default_reminder_cron")]
    pub cron: String,

    /// Whether the job is armed at startup (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Execution timeout in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How far ahead to look for upcoming tournaments (default: 24)
    #[serde(default = "default_upcoming_window_hours")]
    pub upcoming_window_hours: u32,
}

fn default_reminder_cron() -> String {
    "0 9 * * *".to_string()
}

fn default_upcoming_window_hours() -> u32 {
    24
}

impl Default for ReminderJobConfig {
    fn default() -> Self {
        Self {
            cron: default_reminder_cron(),
            enabled: default_enabled(),
            timeout_secs: default_timeout_secs(),
            upcoming_window_hours: default_upcoming_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStats {
    pub daily_reminders_sent: u32,
    pub upcoming_reminders_sent: u32,
}

/// Handler that sends daily and upcoming reminders.
pub struct ReminderJob {
    store: Arc<dyn TournamentStore>,
    /// `None` when the window is too large to represent, i.e. unbounded.
    upcoming_window: Option<chrono::Duration>,
}

impl ReminderJob {
    pub fn new(store: Arc<dyn TournamentStore>, upcoming_window_hours: u32) -> Self {
        Self {
            store,
            upcoming_window: chrono::Duration::try_hours(i64::from(upcoming_window_hours)),
        }
    }

    /// Send every reminder due at `now`.
    pub async fn process(
        &self,
        now: DateTime<Utc>,
        shutdown: &CancellationToken,
    ) -> Result<ReminderStats, StoreError> {
        let mut stats = ReminderStats {
            daily_reminders_sent: self.send_daily(now, shutdown).await?,
            ..Default::default()
        };
        if !shutdown.is_cancelled() {
            stats.upcoming_reminders_sent = self.send_upcoming(now, shutdown).await?;
        }
        Ok(stats)
    }

    async fn send_daily(
        &self,
        now: DateTime<Utc>,
        shutdown: &CancellationToken,
    ) -> Result<u32, StoreError> {
        let today = now.date_naive();
        let mut sent = 0;

        for tournament in self.store.list_by_status(TournamentStatus::InProgress).await? {
            if shutdown.is_cancelled() {
                warn!("Shutdown requested, stopping daily reminders early");
                break;
            }
            let message = format!(
                "Don't forget to log today's score for \"{}\"",
                tournament.name
            );
            for user_id in tournament.joined_participants() {
                if self.store.has_score_on(&tournament.id, user_id, today).await? {
                    debug!(user = %user_id, tournament = %tournament.id, "Score already logged today");
                    continue;
                }
                if notify_once(
                    self.store.as_ref(),
                    user_id,
                    &tournament.id,
                    NotificationKind::DailyReminder,
                    &message,
                    now,
                )
                .await?
                {
                    sent += 1;
                }
            }
        }
        Ok(sent)
    }

    async fn send_upcoming(
        &self,
        now: DateTime<Utc>,
        shutdown: &CancellationToken,
    ) -> Result<u32, StoreError> {
        let horizon = self
            .upcoming_window
            .and_then(|window| now.checked_add_signed(window));
        let mut sent = 0;

        for tournament in self.store.list_by_status(TournamentStatus::Pending).await? {
            let beyond_window = horizon.is_some_and(|horizon| tournament.start_date > horizon);
            if tournament.start_date <= now || beyond_window {
                continue;
            }
            if shutdown.is_cancelled() {
                warn!("Shutdown requested, stopping upcoming reminders early");
                break;
            }
            let message = format!(
                "Tournament \"{}\" starts at {}",
                tournament.name,
                tournament.start_date.format("%Y-%m-%d %H:%M UTC")
            );
            for user_id in tournament.audience() {
                if notify_once(
                    self.store.as_ref(),
                    user_id,
                    &tournament.id,
                    NotificationKind::UpcomingReminder,
                    &message,
                    now,
                )
                .await?
                {
                    sent += 1;
                }
            }
        }
        Ok(sent)
    }
}

#[async_trait]
impl JobHandler for ReminderJob {
    async fn run(&self, context: ExecutionContext) -> anyhow::Result<ExecutionOutcome> {
        let started = Instant::now();
        let stats = self.process(context.start_time, &context.shutdown).await?;
        info!(
            daily = stats.daily_reminders_sent,
            upcoming = stats.upcoming_reminders_sent,
            "Tournament reminders sent"
        );
        Ok(ExecutionOutcome::success(Some(serde_json::to_value(stats)?))
            .with_duration_ms(started.elapsed().as_millis() as u64))
    }
}

/// Register the reminder job with the scheduler.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidSchedule` if `config.cron` does not parse.
pub async fn register_reminder_job(
    scheduler: &SchedulerService,
    store: Arc<dyn TournamentStore>,
    config: &ReminderJobConfig,
) -> Result<(), SchedulerError> {
    validate_cron_expression(&config.cron)?;

    let definition = JobDefinition::new(REMINDER_JOB_ID, "Tournament Reminders", config.cron.as_str())
        .with_description("Remind participants to log scores and announce upcoming tournaments")
        .with_enabled(config.enabled)
        .with_timeout(Duration::from_secs(config.timeout_secs));

    scheduler
        .register_job(
            definition,
            Arc::new(ReminderJob::new(store, config.upcoming_window_hours)),
        )
        .await;

    info!(cron = %config.cron, enabled = config.enabled, "Registered tournament reminder job");
    Ok(())
}
