//! Cron triggers built on tokio-cron-scheduler.
//!
//! Each job id is either unarmed or armed with exactly one cron job in the
//! underlying `JobScheduler`. Ticks only hand the job id to the runner and
//! return, so a slow or failing handler never delays or stops a trigger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::JobRegistry;
use crate::runner::ExecutionRunner;
use crate::schedule::{next_execution_time, normalize_cron_expression};
use crate::SchedulerError;

/// Owns the armed triggers, one per enabled job.
pub struct TriggerEngine {
    scheduler: JobScheduler,
    registry: Arc<JobRegistry>,
    runner: ExecutionRunner,
    timers: Mutex<HashMap<String, Uuid>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl TriggerEngine {
    /// Create the trigger engine. Triggers only fire once `start()` is called.
    pub async fn new(
        registry: Arc<JobRegistry>,
        runner: ExecutionRunner,
    ) -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            registry,
            runner,
            timers: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Start firing armed triggers. Calling it again has no effect.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyShutDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.scheduler.start().await?;
        info!("Trigger engine started");
        Ok(())
    }

    /// Arm (or re-arm) the trigger for a registered job.
    ///
    /// Any existing trigger for the job is replaced. On error the job is left
    /// exactly as it was.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::JobNotFound` if the job is not registered
    /// - `SchedulerError::InvalidSchedule` if its cron expression is invalid
    /// - `SchedulerError::AlreadyShutDown` after `shutdown()`
    pub async fn schedule(&self, job_id: &str) -> Result<DateTime<Utc>, SchedulerError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        let cron_expr = normalize_cron_expression(&job.definition.schedule)?;
        let next = next_execution_time(&cron_expr, Utc::now())?;

        let tick_job_id = job_id.to_string();
        let tick_expr = cron_expr.clone();
        let registry = self.registry.clone();
        let runner = self.runner.clone();

        let cron_job = Job::new_async_tz(cron_expr.as_str(), Utc, move |_uuid, _scheduler| {
            let job_id = tick_job_id.clone();
            let cron_expr = tick_expr.clone();
            let registry = registry.clone();
            let runner = runner.clone();

            Box::pin(async move {
                debug!(job = %job_id, "Trigger fired");
                if let Ok(next) = next_execution_time(&cron_expr, Utc::now()) {
                    registry.set_next_execution(&job_id, next);
                }
                runner.spawn_scheduled(job_id);
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule(format!("'{}': {}", cron_expr, e)))?;

        let mut timers = self.timers.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyShutDown);
        }

        if let Some(previous) = timers.remove(job_id) {
            if let Err(e) = self.scheduler.remove(&previous).await {
                warn!(job = %job_id, error = %e, "Failed to remove previous trigger");
            }
        }

        let uuid = self.scheduler.add(cron_job).await?;
        timers.insert(job_id.to_string(), uuid);
        self.registry.set_armed(job_id, next);

        info!(job = %job_id, uuid = %uuid, cron = %cron_expr, next = %next, "Job scheduled");
        Ok(next)
    }

    /// Disarm the trigger for a job.
    ///
    /// Returns `false` if no trigger was armed.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let mut timers = self.timers.lock().await;
        let Some(uuid) = timers.remove(job_id) else {
            return false;
        };

        if let Err(e) = self.scheduler.remove(&uuid).await {
            warn!(job = %job_id, error = %e, "Failed to remove trigger");
        }
        self.registry.set_unarmed(job_id);

        info!(job = %job_id, "Job schedule cancelled");
        true
    }

    /// Whether a trigger is armed for the job.
    pub async fn is_armed(&self, job_id: &str) -> bool {
        self.timers.lock().await.contains_key(job_id)
    }

    /// Number of armed triggers.
    pub async fn armed_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Disarm every trigger and stop the underlying scheduler.
    ///
    /// Safe to call more than once. Executions already handed to the runner
    /// are not affected.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut timers = self.timers.lock().await;
        for (job_id, uuid) in timers.drain() {
            if let Err(e) = self.scheduler.remove(&uuid).await {
                warn!(job = %job_id, error = %e, "Failed to remove trigger");
            }
            self.registry.set_unarmed(&job_id);
        }
        drop(timers);

        if self.started.load(Ordering::SeqCst) {
            let mut scheduler = self.scheduler.clone();
            if let Err(e) = scheduler.shutdown().await {
                warn!("Error during trigger engine shutdown: {}", e);
            }
        }

        info!("Trigger engine stopped");
    }
}
