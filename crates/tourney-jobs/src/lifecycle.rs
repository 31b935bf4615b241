//! Tournament status update job.
//!
//! Moves tournaments through `pending -> in_progress -> completed` as their
//! start and end dates pass, and tells everyone involved. Runs hourly by
//! default.
//!
//! Notifications are deduplicated per user, tournament and kind within a
//! UTC day, so a rerun (manual or after a crash) never double-notifies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tourney_scheduler::{
    validate_cron_expression, ExecutionContext, ExecutionOutcome, JobDefinition, JobHandler,
    SchedulerError, SchedulerService,
};

use crate::error::StoreError;
use crate::notify::notify_once;
use crate::store::TournamentStore;
use crate::types::{NotificationKind, Tournament, TournamentStatus};

/// Job id of the status update job.
pub const TOURNAMENT_LIFECYCLE_JOB_ID: &str = "tournament-status-update";

/// Configuration for the tournament status update job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentLifecycleJobConfig {
    /// Cron expression (default: "0 * * * *" = top of every hour)
    #[serde(default = "default_lifecycle_cron")]
    pub cron: String,

    /// Whether the job is armed at startup (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Execution timeout in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_lifecycle_cron() -> String {
    "0 * * * *".to_string()
}

pub(crate) fn default_enabled() -> bool {
    true
}

pub(crate) fn default_timeout_secs() -> u64 {
    300
}

impl Default for TournamentLifecycleJobConfig {
    fn default() -> Self {
        Self {
            cron: default_lifecycle_cron(),
            enabled: default_enabled(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Counts reported in the execution record's `result`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStats {
    pub tournaments_started: u32,
    pub tournaments_completed: u32,
}

/// Handler that applies due status transitions.
pub struct TournamentLifecycleJob {
    store: Arc<dyn TournamentStore>,
}

impl TournamentLifecycleJob {
    pub fn new(store: Arc<dyn TournamentStore>) -> Self {
        Self { store }
    }

    /// Apply every transition due at `now`.
    ///
    /// Both status lists are read before any update, so a tournament started
    /// in this pass is not also completed in it. Stops between tournaments
    /// once `shutdown` is cancelled.
    pub async fn process(
        &self,
        now: DateTime<Utc>,
        shutdown: &CancellationToken,
    ) -> Result<LifecycleStats, StoreError> {
        let pending = self.store.list_by_status(TournamentStatus::Pending).await?;
        let in_progress = self
            .store
            .list_by_status(TournamentStatus::InProgress)
            .await?;

        let mut stats = LifecycleStats::default();

        for tournament in pending.iter().filter(|t| t.should_start(now)) {
            if shutdown.is_cancelled() {
                warn!("Shutdown requested, stopping tournament status update early");
                return Ok(stats);
            }
            self.transition(
                tournament,
                TournamentStatus::InProgress,
                NotificationKind::TournamentStart,
                &format!("Tournament \"{}\" has started. Good luck!", tournament.name),
                now,
            )
            .await?;
            stats.tournaments_started += 1;
        }

        for tournament in in_progress.iter().filter(|t| t.should_complete(now)) {
            if shutdown.is_cancelled() {
                warn!("Shutdown requested, stopping tournament status update early");
                return Ok(stats);
            }
            self.transition(
                tournament,
                TournamentStatus::Completed,
                NotificationKind::TournamentEnd,
                &format!(
                    "Tournament \"{}\" has ended. Check the final standings!",
                    tournament.name
                ),
                now,
            )
            .await?;
            stats.tournaments_completed += 1;
        }

        Ok(stats)
    }

    async fn transition(
        &self,
        tournament: &Tournament,
        status: TournamentStatus,
        kind: NotificationKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store.update_status(&tournament.id, status).await?;

        let mut notified = 0usize;
        for user_id in tournament.audience() {
            if notify_once(self.store.as_ref(), user_id, &tournament.id, kind, message, now).await? {
                notified += 1;
            }
        }

        info!(
            tournament = %tournament.id,
            status = ?status,
            notified,
            "Tournament status updated"
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for TournamentLifecycleJob {
    async fn run(&self, context: ExecutionContext) -> anyhow::Result<ExecutionOutcome> {
        let started = Instant::now();
        let stats = self.process(context.start_time, &context.shutdown).await?;
        info!(
            started = stats.tournaments_started,
            completed = stats.tournaments_completed,
            "Tournament status update complete"
        );
        Ok(ExecutionOutcome::success(Some(serde_json::to_value(stats)?))
            .with_duration_ms(started.elapsed().as_millis() as u64))
    }
}

/// Register the status update job with the scheduler.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidSchedule` if `config.cron` does not parse.
pub async fn register_tournament_lifecycle_job(
    scheduler: &SchedulerService,
    store: Arc<dyn TournamentStore>,
    config: &TournamentLifecycleJobConfig,
) -> Result<(), SchedulerError> {
    validate_cron_expression(&config.cron)?;

    let definition = JobDefinition::new(
        TOURNAMENT_LIFECYCLE_JOB_ID,
        "Tournament Status Update",
        config.cron.as_str(),
    )
    .with_description("Start due tournaments, complete finished ones and notify participants")
    .with_enabled(config.enabled)
    .with_timeout(Duration::from_secs(config.timeout_secs));

    scheduler
        .register_job(definition, Arc::new(TournamentLifecycleJob::new(store)))
        .await;

    info!(cron = %config.cron, enabled = config.enabled, "Registered tournament status update job");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTournamentStore;
    use crate::types::Participant;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn tournament(id: &str, status: TournamentStatus, start: DateTime<Utc>, days: u32) -> Tournament {
        Tournament {
            id: id.to_string(),
            name: format!("Cup {}", id),
            creator_id: "creator".into(),
            status,
            start_date: start,
            duration_days: days,
            participants: vec![Participant::joined("alice"), Participant::joined("bob")],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = TournamentLifecycleJobConfig::default();
        assert_eq!(config.cron, "0 * * * *");
        assert!(config.enabled);
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(LifecycleStats {
            tournaments_started: 2,
            tournaments_completed: 1,
        })
        .unwrap();
        assert_eq!(json["tournamentsStarted"], 2);
        assert_eq!(json["tournamentsCompleted"], 1);
    }

    #[tokio::test]
    async fn test_completes_finished_tournament() {
        let store = Arc::new(InMemoryTournamentStore::new());
        let start = now() - ChronoDuration::days(7);
        store
            .insert_tournament(tournament("done", TournamentStatus::InProgress, start, 7))
            .await;
        store
            .insert_tournament(tournament("running", TournamentStatus::InProgress, start, 8))
            .await;

        let job = TournamentLifecycleJob::new(store.clone());
        let stats = job.process(now(), &CancellationToken::new()).await.unwrap();

        assert_eq!(stats.tournaments_completed, 1);
        assert_eq!(store.tournament("done").await.unwrap().status, TournamentStatus::Completed);
        assert_eq!(store.tournament("running").await.unwrap().status, TournamentStatus::InProgress);

        let ends: Vec<_> = store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.kind == NotificationKind::TournamentEnd)
            .collect();
        assert_eq!(ends.len(), 3);
        assert!(ends.iter().all(|n| n.tournament_id == "done"));
    }

    #[tokio::test]
    async fn test_cancelled_and_future_tournaments_untouched() {
        let store = Arc::new(InMemoryTournamentStore::new());
        store
            .insert_tournament(tournament("off", TournamentStatus::Cancelled, now() - ChronoDuration::days(1), 1))
            .await;
        store
            .insert_tournament(tournament("later", TournamentStatus::Pending, now() + ChronoDuration::hours(1), 1))
            .await;

        let job = TournamentLifecycleJob::new(store.clone());
        let stats = job.process(now(), &CancellationToken::new()).await.unwrap();

        assert_eq!(stats, LifecycleStats::default());
        assert_eq!(store.tournament("off").await.unwrap().status, TournamentStatus::Cancelled);
        assert_eq!(store.tournament("later").await.unwrap().status, TournamentStatus::Pending);
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_started_tournament_not_completed_in_same_pass() {
        let store = Arc::new(InMemoryTournamentStore::new());
        store
            .insert_tournament(tournament("flash", TournamentStatus::Pending, now() - ChronoDuration::hours(1), 0))
            .await;

        let job = TournamentLifecycleJob::new(store.clone());
        let stats = job.process(now(), &CancellationToken::new()).await.unwrap();
        assert_eq!(stats.tournaments_started, 1);
        assert_eq!(stats.tournaments_completed, 0);
        assert_eq!(store.tournament("flash").await.unwrap().status, TournamentStatus::InProgress);

        let stats = job.process(now(), &CancellationToken::new()).await.unwrap();
        assert_eq!(stats.tournaments_completed, 1);
        assert_eq!(store.tournament("flash").await.unwrap().status, TournamentStatus::Completed);
    }

    #[tokio::test]
    async fn test_unrepresentable_end_date_does_not_block_others() {
        let store = Arc::new(InMemoryTournamentStore::new());
        let start = now() - ChronoDuration::days(7);
        store
            .insert_tournament(tournament("endless", TournamentStatus::InProgress, start, u32::MAX))
            .await;
        store
            .insert_tournament(tournament("ok", TournamentStatus::InProgress, start, 3))
            .await;

        let job = TournamentLifecycleJob::new(store.clone());
        let stats = job.process(now(), &CancellationToken::new()).await.unwrap();

        assert_eq!(stats.tournaments_completed, 1);
        assert_eq!(store.tournament("ok").await.unwrap().status, TournamentStatus::Completed);
        assert_eq!(
            store.tournament("endless").await.unwrap().status,
            TournamentStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_stops_when_shutdown_requested() {
        let store = Arc::new(InMemoryTournamentStore::new());
        store
            .insert_tournament(tournament("a", TournamentStatus::Pending, now() - ChronoDuration::hours(1), 3))
            .await;

        let token = CancellationToken::new();
        token.cancel();

        let job = TournamentLifecycleJob::new(store.clone());
        let stats = job.process(now(), &token).await.unwrap();
        assert_eq!(stats, LifecycleStats::default());
        assert_eq!(store.tournament("a").await.unwrap().status, TournamentStatus::Pending);
    }
}
