//! Execution of a single job invocation.
//!
//! Every handler call runs as its own task on a shared `TaskTracker`, so a
//! panic is caught at the task boundary and a timed-out handler keeps running
//! detached while the runner moves on. Nothing a handler does can escape the
//! runner other than through the returned `ExecutionRecord`.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::history::HistoryLedger;
use crate::registry::{JobRegistry, RegisteredJob};
use crate::types::{ExecutionContext, ExecutionOutcome, ExecutionRecord, ExecutionStatus, Metadata};
use crate::SchedulerError;

/// Metadata key describing what caused an execution.
pub const TRIGGER_KEY: &str = "trigger";

/// How a handler invocation settled.
enum Settled {
    Finished(Result<anyhow::Result<ExecutionOutcome>, JoinError>),
    TimedOut(Duration),
}

/// Runs job handlers and records their results.
#[derive(Clone)]
pub struct ExecutionRunner {
    registry: Arc<JobRegistry>,
    history: Arc<HistoryLedger>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl ExecutionRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        history: Arc<HistoryLedger>,
        tracker: TaskTracker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            history,
            tracker,
            shutdown,
        }
    }

    /// Execute a job now and wait for the result.
    ///
    /// The execution itself runs as a tracked task, so dropping the returned
    /// future does not stop it and its record is still finalized.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::JobNotFound` if the job is not registered. No
    /// record is created in that case. Handler failures, panics and timeouts
    /// are reported through the returned record, never as an error.
    pub async fn execute(
        &self,
        job_id: &str,
        metadata: Metadata,
    ) -> Result<ExecutionRecord, SchedulerError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        let runner = self.clone();
        self.tracker
            .spawn(async move { runner.run_to_completion(job, metadata).await })
            .await
            .map_err(|e| SchedulerError::Scheduler(format!("execution task failed: {}", e)))
    }

    /// Record the start, race the handler against its timeout and finalize.
    async fn run_to_completion(&self, job: RegisteredJob, metadata: Metadata) -> ExecutionRecord {
        let job_id = job.definition.id.clone();
        let mut record = ExecutionRecord::started(job_id.as_str(), 1);
        self.history.append(record.clone());
        self.registry.record_start(&record);

        let context = ExecutionContext {
            job_id: job_id.clone(),
            execution_id: record.execution_id,
            start_time: record.start_time,
            attempt: record.attempt,
            metadata,
            shutdown: self.shutdown.clone(),
        };

        info!(job = %job_id, execution_id = %record.execution_id, "Job started");

        let handler = job.handler.clone();
        let task = self.tracker.spawn(async move { handler.run(context).await });

        let settled = match job.definition.timeout() {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => Settled::Finished(joined),
                // The handler task is left running; its result is dropped.
                Err(_) => Settled::TimedOut(limit),
            },
            None => Settled::Finished(task.await),
        };

        let mut reported_duration_ms = None;
        let (status, error, result) = match settled {
            Settled::Finished(Ok(Ok(outcome))) => {
                reported_duration_ms = (outcome.duration_ms > 0).then_some(outcome.duration_ms);
                if outcome.success {
                    (ExecutionStatus::Completed, None, outcome.data)
                } else {
                    (
                        ExecutionStatus::Failed,
                        Some(
                            outcome
                                .error
                                .unwrap_or_else(|| "Job reported failure".to_string()),
                        ),
                        outcome.data,
                    )
                }
            }
            Settled::Finished(Ok(Err(e))) => (ExecutionStatus::Failed, Some(format!("{:#}", e)), None),
            Settled::Finished(Err(join_err)) => {
                (ExecutionStatus::Failed, Some(describe_join_error(join_err)), None)
            }
            Settled::TimedOut(limit) => (
                ExecutionStatus::Failed,
                Some(format!("Job timed out after {}ms", limit.as_millis())),
                None,
            ),
        };

        record.finish(status, error, result);
        self.history.update(&record);
        self.registry.record_complete(&record);

        let duration_ms = record.duration_ms().unwrap_or(0);
        match record.status {
            ExecutionStatus::Completed => info!(
                job = %job_id,
                execution_id = %record.execution_id,
                duration_ms,
                reported_duration_ms,
                "Job completed"
            ),
            _ => warn!(
                job = %job_id,
                execution_id = %record.execution_id,
                duration_ms,
                reported_duration_ms,
                error = record.error.as_deref().unwrap_or_default(),
                "Job failed"
            ),
        }

        record
    }

    /// Run a job in the background on behalf of a trigger tick.
    ///
    /// Returns immediately. The tick itself never sees the outcome.
    pub fn spawn_scheduled(&self, job_id: String) {
        let runner = self.clone();
        self.tracker.spawn(async move {
            let mut metadata = Metadata::new();
            metadata.insert(TRIGGER_KEY.to_string(), serde_json::json!("schedule"));
            if let Err(e) = runner.execute(&job_id, metadata).await {
                warn!(job = %job_id, error = %e, "Scheduled execution could not start");
            }
        });
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("Job handler panicked: {}", panic_message(err.into_panic()))
    } else {
        "Job handler was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, SharedHandler};
    use crate::types::JobDefinition;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn runner_with(definition: JobDefinition, handler: SharedHandler) -> ExecutionRunner {
        let registry = Arc::new(JobRegistry::new());
        registry.register(definition, handler);
        ExecutionRunner::new(
            registry,
            Arc::new(HistoryLedger::new(100)),
            TaskTracker::new(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_execute_success() {
        let runner = runner_with(
            JobDefinition::new("ok", "Ok", "0 * * * *"),
            handler_fn(|ctx| async move {
                assert_eq!(ctx.attempt, 1);
                Ok(ExecutionOutcome::success(Some(serde_json::json!({"processed": 3}))))
            }),
        );

        let record = runner.execute("ok", Metadata::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.result, Some(serde_json::json!({"processed": 3})));
        assert!(record.error.is_none());
        assert!(record.end_time.is_some());

        let stored = runner.history.query(Some("ok"), 10);
        assert_eq!(stored, vec![record.clone()]);

        let job = runner.registry.get("ok").unwrap();
        assert_eq!(job.run_count, 1);
        assert_eq!(job.running, 0);
        assert_eq!(job.last_execution, Some(record));
    }

    #[tokio::test]
    async fn test_execute_reported_failure() {
        let runner = runner_with(
            JobDefinition::new("soft-fail", "Soft fail", "0 * * * *"),
            handler_fn(|_ctx| async { Ok(ExecutionOutcome::failure("nothing to do")) }),
        );

        let record = runner.execute("soft-fail", Metadata::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("nothing to do"));
        assert_eq!(runner.registry.get("soft-fail").unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn test_execute_handler_error() {
        let runner = runner_with(
            JobDefinition::new("err", "Err", "0 * * * *"),
            handler_fn(|_ctx| async {
                let inner: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
                anyhow::Context::context(inner, "loading tournaments")?;
                Ok(ExecutionOutcome::success(None))
            }),
        );

        let record = runner.execute("err", Metadata::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("loading tournaments: connection refused")
        );
    }

    #[tokio::test]
    async fn test_execute_handler_panic() {
        let runner = runner_with(
            JobDefinition::new("panics", "Panics", "0 * * * *"),
            handler_fn(|_ctx| async {
                if true {
                    panic!("index out of bounds");
                }
                Ok(ExecutionOutcome::success(None))
            }),
        );

        let record = runner.execute("panics", Metadata::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        let error = record.error.unwrap();
        assert!(error.contains("panicked"));
        assert!(error.contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let runner = runner_with(
            JobDefinition::new("hangs", "Hangs", "0 * * * *")
                .with_timeout(Duration::from_millis(50)),
            handler_fn(|_ctx| async {
                std::future::pending::<()>().await;
                Ok(ExecutionOutcome::success(None))
            }),
        );

        let started = std::time::Instant::now();
        let record = runner.execute("hangs", Metadata::new()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.unwrap().contains("timed out"));
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_execute_timeout_discards_late_result() {
        let runner = runner_with(
            JobDefinition::new("late", "Late", "0 * * * *")
                .with_timeout(Duration::from_millis(20)),
            handler_fn(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(ExecutionOutcome::success(Some(serde_json::json!("late"))))
            }),
        );

        let record = runner.execute("late", Metadata::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let stored = &runner.history.query(Some("late"), 1)[0];
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn test_dropped_caller_still_finalizes_record() {
        let runner = runner_with(
            JobDefinition::new("slow", "Slow", "0 * * * *"),
            handler_fn(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(ExecutionOutcome::success(Some(serde_json::json!("done"))))
            }),
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), runner.execute("slow", Metadata::new()))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        let stored = &runner.history.query(Some("slow"), 1)[0];
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert!(stored.end_time.is_some());
        assert_eq!(stored.result, Some(serde_json::json!("done")));

        let job = runner.registry.get("slow").unwrap();
        assert_eq!(job.running, 0);
        assert_eq!(job.run_count, 1);
    }

    #[tokio::test]
    async fn test_execute_without_timeout_waits() {
        let runner = runner_with(
            JobDefinition::new("slow", "Slow", "0 * * * *"),
            handler_fn(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(ExecutionOutcome::success(None))
            }),
        );

        let record = runner.execute("slow", Metadata::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.duration_ms().unwrap() >= 60);
    }

    #[tokio::test]
    async fn test_execute_unknown_job_creates_no_record() {
        let runner = runner_with(
            JobDefinition::new("known", "Known", "0 * * * *"),
            handler_fn(|_ctx| async { Ok(ExecutionOutcome::success(None)) }),
        );

        let result = runner.execute("does-not-exist", Metadata::new()).await;
        assert!(matches!(result, Err(SchedulerError::JobNotFound(id)) if id == "does-not-exist"));
        assert!(runner.history.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_executions_get_separate_records() {
        let runner = runner_with(
            JobDefinition::new("parallel", "Parallel", "0 * * * *"),
            handler_fn(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(ExecutionOutcome::success(None))
            }),
        );

        let (a, b) = tokio::join!(
            runner.execute("parallel", Metadata::new()),
            runner.execute("parallel", Metadata::new())
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.execution_id, b.execution_id);
        assert_eq!(runner.history.query(Some("parallel"), 10).len(), 2);
        assert_eq!(runner.registry.get("parallel").unwrap().run_count, 2);
    }

    #[tokio::test]
    async fn test_spawn_scheduled_runs_in_background() {
        let counter = Arc::new(AtomicU32::new(0));
        let seen = counter.clone();
        let runner = runner_with(
            JobDefinition::new("tick", "Tick", "0 * * * *"),
            handler_fn(move |ctx| {
                let seen = seen.clone();
                async move {
                    assert_eq!(ctx.metadata.get(TRIGGER_KEY), Some(&serde_json::json!("schedule")));
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(ExecutionOutcome::success(None))
                }
            }),
        );

        runner.spawn_scheduled("tick".to_string());
        runner.spawn_scheduled("tick".to_string());
        runner.tracker.close();
        runner.tracker.wait().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(runner.history.query(Some("tick"), 10).len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_token_reaches_handler() {
        let runner = runner_with(
            JobDefinition::new("coop", "Coop", "0 * * * *"),
            handler_fn(|ctx| async move {
                ctx.shutdown.cancelled().await;
                Ok(ExecutionOutcome::failure("stopped by shutdown"))
            }),
        );

        let token = runner.shutdown.clone();
        let pending = tokio::spawn({
            let runner = runner.clone();
            async move { runner.execute("coop", Metadata::new()).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let record = pending.await.unwrap().unwrap();
        assert_eq!(record.error.as_deref(), Some("stopped by shutdown"));
    }
}
