//! Scheduler service: the public face of the engine.
//!
//! `SchedulerService` wires the registry, trigger engine, runner and history
//! ledger together and owns the engine lifecycle. Create one per process in
//! the composition root and share it behind an `Arc`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::handler::SharedHandler;
use crate::history::HistoryLedger;
use crate::lifecycle::{shutdown_signal, LifecycleState};
use crate::registry::{JobRegistry, RegisteredJob};
use crate::runner::{ExecutionRunner, TRIGGER_KEY};
use crate::trigger::TriggerEngine;
use crate::types::{ExecutionRecord, JobDefinition, Metadata};
use crate::{SchedulerConfig, SchedulerError};

/// In-process cron job engine.
pub struct SchedulerService {
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    history: Arc<HistoryLedger>,
    runner: ExecutionRunner,
    trigger: TriggerEngine,
    state: Mutex<LifecycleState>,
    shutdown_token: CancellationToken,
    tracker: TaskTracker,
}

impl SchedulerService {
    /// Create a new scheduler service with the given configuration.
    ///
    /// Jobs can be registered right away; triggers only start firing after
    /// `initialize()`.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let registry = Arc::new(JobRegistry::new());
        let history = Arc::new(HistoryLedger::new(config.history_capacity));
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let runner = ExecutionRunner::new(
            registry.clone(),
            history.clone(),
            tracker.clone(),
            shutdown_token.clone(),
        );
        let trigger = TriggerEngine::new(registry.clone(), runner.clone()).await?;

        Ok(Self {
            config,
            registry,
            history,
            runner,
            trigger,
            state: Mutex::new(LifecycleState::Uninitialized),
            shutdown_token,
            tracker,
        })
    }

    /// Get the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get the job registry.
    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Register a job and arm it if enabled.
    ///
    /// A duplicate id is logged and ignored; the first registration wins.
    /// An invalid schedule is logged and leaves the job registered but unarmed.
    pub async fn register_job(&self, definition: JobDefinition, handler: SharedHandler) {
        let job_id = definition.id.clone();
        let enabled = definition.enabled;

        if !self.registry.register(definition, handler) {
            return;
        }
        if enabled {
            self.schedule_job(&job_id).await;
        }
    }

    /// Arm (or re-arm) a job's trigger.
    ///
    /// Returns `false` for an unknown id, an invalid cron expression, or a
    /// shut down engine.
    pub async fn schedule_job(&self, job_id: &str) -> bool {
        match self.trigger.schedule(job_id).await {
            Ok(_) => true,
            Err(e) => {
                warn!(job = %job_id, error = %e, "Failed to schedule job");
                false
            }
        }
    }

    /// Disarm a job's trigger. Returns `false` if it was not armed.
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        self.trigger.cancel(job_id).await
    }

    /// Execute a job immediately and wait for its record.
    ///
    /// `metadata` gets `"trigger": "manual"` unless the caller set a trigger.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::JobNotFound` for an unknown id. Handler
    /// failures are reported in the returned record.
    pub async fn execute_job(
        &self,
        job_id: &str,
        mut metadata: Metadata,
    ) -> Result<ExecutionRecord, SchedulerError> {
        metadata
            .entry(TRIGGER_KEY.to_string())
            .or_insert_with(|| serde_json::json!("manual"));
        self.runner.execute(job_id, metadata).await
    }

    /// Get a snapshot of one job.
    pub fn get_job(&self, job_id: &str) -> Option<RegisteredJob> {
        self.registry.get(job_id)
    }

    /// Get snapshots of all jobs, ordered by id.
    pub fn get_all_jobs(&self) -> Vec<RegisteredJob> {
        self.registry.list()
    }

    /// Execution history, most recent first.
    ///
    /// Uses `default_history_limit` when `limit` is `None`.
    pub fn get_execution_history(
        &self,
        job_id: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<ExecutionRecord> {
        self.history
            .query(job_id, limit.unwrap_or(self.config.default_history_limit))
    }

    /// Number of armed triggers.
    pub async fn armed_count(&self) -> usize {
        self.trigger.armed_count().await
    }

    /// Start the engine.
    ///
    /// Arms every enabled job, starts the triggers and, if configured, binds
    /// SIGINT/SIGTERM to `shutdown()`. Calling it again while initialized
    /// only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyShutDown` after `shutdown()`; an engine
    /// is never restarted.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().await;
        match *state {
            LifecycleState::Initialized => {
                warn!("Scheduler already initialized");
                return Ok(());
            }
            LifecycleState::ShutDown => return Err(SchedulerError::AlreadyShutDown),
            LifecycleState::Uninitialized => {}
        }

        for job in self.registry.list() {
            if job.definition.enabled {
                self.schedule_job(job.id()).await;
            }
        }
        self.trigger.start().await?;
        *state = LifecycleState::Initialized;
        drop(state);

        if self.config.install_signal_handlers {
            let engine = Arc::clone(self);
            let token = self.shutdown_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown_signal() => engine.shutdown().await,
                    _ = token.cancelled() => {}
                }
            });
        }

        info!(
            jobs = self.registry.job_count(),
            armed = self.trigger.armed_count().await,
            "Scheduler initialized"
        );
        Ok(())
    }

    /// Stop the engine.
    ///
    /// Disarms every trigger, cancels the shutdown token seen by handlers and
    /// waits up to `shutdown_timeout_secs` for in-flight executions. Running
    /// handlers are never aborted. Safe to call more than once.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().await;
            if *state == LifecycleState::ShutDown {
                debug!("Scheduler already shut down");
                return;
            }
            *state = LifecycleState::ShutDown;
        }

        info!("Initiating scheduler shutdown");

        self.shutdown_token.cancel();
        self.trigger.shutdown().await;

        self.tracker.close();
        if tokio::time::timeout(self.config.shutdown_timeout(), self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.tracker.len(),
                "Shutdown grace period elapsed with executions still running"
            );
        }

        info!("Scheduler shutdown complete");
    }

    /// Resolves once `shutdown()` has been initiated.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// Token cancelled when the engine shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
