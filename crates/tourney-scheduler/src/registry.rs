//! Job registry holding job definitions, handlers and status.
//!
//! The `JobRegistry` is a thread-safe map from job id to [`RegisteredJob`].
//! It never executes or schedules anything itself; the trigger engine and
//! the execution runner report into it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::handler::SharedHandler;
use crate::types::{ExecutionRecord, ExecutionStatus, JobDefinition};

/// A job definition bound to its handler, plus observed status.
#[derive(Clone, Serialize)]
pub struct RegisteredJob {
    /// Static description of the job
    pub definition: JobDefinition,
    /// Handler invoked for each execution
    #[serde(skip)]
    pub handler: SharedHandler,
    /// Most recent execution started for this job
    pub last_execution: Option<ExecutionRecord>,
    /// When the armed trigger fires next; `None` while unarmed
    pub next_execution_time: Option<DateTime<Utc>>,
    /// Whether a trigger is currently armed for the job
    pub armed: bool,
    /// Total number of finished executions
    pub run_count: u64,
    /// Total number of failed executions
    pub error_count: u64,
    /// Number of executions currently in flight
    pub running: u32,
}

impl RegisteredJob {
    fn new(definition: JobDefinition, handler: SharedHandler) -> Self {
        Self {
            definition,
            handler,
            last_execution: None,
            next_execution_time: None,
            armed: false,
            run_count: 0,
            error_count: 0,
            running: 0,
        }
    }

    /// Id of the job.
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

impl fmt::Debug for RegisteredJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredJob")
            .field("definition", &self.definition)
            .field("last_execution", &self.last_execution)
            .field("next_execution_time", &self.next_execution_time)
            .field("armed", &self.armed)
            .field("run_count", &self.run_count)
            .field("error_count", &self.error_count)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

/// Registry of jobs known to the engine.
///
/// # Example
///
/// ```
/// use tourney_scheduler::{handler_fn, ExecutionOutcome, JobDefinition, JobRegistry};
///
/// let registry = JobRegistry::new();
/// let handler = handler_fn(|_ctx| async { Ok(ExecutionOutcome::success(None)) });
///
/// assert!(registry.register(JobDefinition::new("nightly", "Nightly", "0 0 * * *"), handler.clone()));
/// // Duplicate ids are ignored
/// assert!(!registry.register(JobDefinition::new("nightly", "Other", "0 1 * * *"), handler));
///
/// assert_eq!(registry.get("nightly").unwrap().definition.name, "Nightly");
/// ```
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, RegisteredJob>>,
}

impl JobRegistry {
    /// Create a new empty job registry.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RegisteredJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RegisteredJob>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job.
    ///
    /// Returns `false` without touching the existing entry if the id is
    /// already registered.
    pub fn register(&self, definition: JobDefinition, handler: SharedHandler) -> bool {
        let mut jobs = self.write();
        if jobs.contains_key(&definition.id) {
            warn!(job = %definition.id, "Job already registered, ignoring");
            return false;
        }
        info!(job = %definition.id, name = %definition.name, schedule = %definition.schedule, enabled = definition.enabled, "Job registered");
        jobs.insert(
            definition.id.clone(),
            RegisteredJob::new(definition, handler),
        );
        true
    }

    /// Get a snapshot of a registered job.
    pub fn get(&self, job_id: &str) -> Option<RegisteredJob> {
        self.read().get(job_id).cloned()
    }

    /// Snapshot of all registered jobs, ordered by id.
    pub fn list(&self) -> Vec<RegisteredJob> {
        let mut jobs: Vec<RegisteredJob> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.definition.id.cmp(&b.definition.id));
        jobs
    }

    /// Check if a job is registered.
    pub fn contains(&self, job_id: &str) -> bool {
        self.read().contains_key(job_id)
    }

    /// Get the number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.read().len()
    }

    /// Record that a trigger was armed, with its next fire time.
    pub fn set_armed(&self, job_id: &str, next: DateTime<Utc>) {
        if let Some(job) = self.write().get_mut(job_id) {
            job.armed = true;
            job.next_execution_time = Some(next);
        }
    }

    /// Record that the job's trigger was cancelled.
    pub fn set_unarmed(&self, job_id: &str) {
        if let Some(job) = self.write().get_mut(job_id) {
            job.armed = false;
            job.next_execution_time = None;
        }
    }

    /// Update the next fire time of an armed job after a tick.
    pub fn set_next_execution(&self, job_id: &str, next: DateTime<Utc>) {
        if let Some(job) = self.write().get_mut(job_id) {
            if job.armed {
                job.next_execution_time = Some(next);
            }
        }
    }

    /// Record that an execution has started.
    pub fn record_start(&self, record: &ExecutionRecord) {
        if let Some(job) = self.write().get_mut(&record.job_id) {
            job.running += 1;
            job.last_execution = Some(record.clone());
        }
    }

    /// Record that an execution has finished.
    ///
    /// `last_execution` is only replaced if it still refers to this
    /// execution, so a slow run never hides a newer one.
    pub fn record_complete(&self, record: &ExecutionRecord) {
        if let Some(job) = self.write().get_mut(&record.job_id) {
            job.running = job.running.saturating_sub(1);
            job.run_count += 1;
            if record.status == ExecutionStatus::Failed {
                job.error_count += 1;
            }
            let is_latest = job
                .last_execution
                .as_ref()
                .is_some_and(|last| last.execution_id == record.execution_id);
            if is_latest {
                job.last_execution = Some(record.clone());
            }
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::types::ExecutionOutcome;

    fn noop() -> SharedHandler {
        handler_fn(|_ctx| async { Ok(ExecutionOutcome::success(None)) })
    }

    fn labelled(label: &'static str) -> SharedHandler {
        handler_fn(move |_ctx| async move {
            Ok(ExecutionOutcome::success(Some(serde_json::json!(label))))
        })
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = JobRegistry::new();
        assert!(registry.register(JobDefinition::new("test-job", "Test", "0 * * * *"), noop()));

        let job = registry.get("test-job").unwrap();
        assert_eq!(job.id(), "test-job");
        assert_eq!(job.definition.schedule, "0 * * * *");
        assert_eq!(job.run_count, 0);
        assert!(!job.armed);
        assert!(job.next_execution_time.is_none());
        assert!(job.last_execution.is_none());
    }

    #[tokio::test]
    async fn test_registry_duplicate_keeps_first_handler() {
        let registry = JobRegistry::new();
        assert!(registry.register(JobDefinition::new("dup", "First", "0 * * * *"), labelled("first")));
        assert!(!registry.register(JobDefinition::new("dup", "Second", "0 1 * * *"), labelled("second")));

        assert_eq!(registry.job_count(), 1);
        let job = registry.get("dup").unwrap();
        assert_eq!(job.definition.name, "First");
        assert_eq!(job.definition.schedule, "0 * * * *");

        let context = crate::types::ExecutionContext {
            job_id: "dup".into(),
            execution_id: uuid::Uuid::new_v4(),
            start_time: Utc::now(),
            attempt: 1,
            metadata: Default::default(),
            shutdown: tokio_util::sync::CancellationToken::new(),
        };
        let outcome = job.handler.run(context).await.unwrap();
        assert_eq!(outcome.data, Some(serde_json::json!("first")));
    }

    #[test]
    fn test_registry_arm_and_unarm() {
        let registry = JobRegistry::new();
        registry.register(JobDefinition::new("job", "Job", "0 * * * *"), noop());

        let next = Utc::now();
        registry.set_armed("job", next);
        let job = registry.get("job").unwrap();
        assert!(job.armed);
        assert_eq!(job.next_execution_time, Some(next));

        registry.set_unarmed("job");
        let job = registry.get("job").unwrap();
        assert!(!job.armed);
        assert!(job.next_execution_time.is_none());

        // Ticks after cancellation do not resurrect the next time
        registry.set_next_execution("job", next);
        assert!(registry.get("job").unwrap().next_execution_time.is_none());
    }

    #[test]
    fn test_registry_record_execution() {
        let registry = JobRegistry::new();
        registry.register(JobDefinition::new("job", "Job", "0 * * * *"), noop());

        let mut record = ExecutionRecord::started("job", 1);
        registry.record_start(&record);
        assert_eq!(registry.get("job").unwrap().running, 1);

        record.finish(ExecutionStatus::Failed, Some("timeout".into()), None);
        registry.record_complete(&record);

        let job = registry.get("job").unwrap();
        assert_eq!(job.running, 0);
        assert_eq!(job.run_count, 1);
        assert_eq!(job.error_count, 1);
        assert_eq!(job.last_execution.unwrap().status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_registry_slow_run_does_not_replace_latest() {
        let registry = JobRegistry::new();
        registry.register(JobDefinition::new("job", "Job", "0 * * * *"), noop());

        let mut slow = ExecutionRecord::started("job", 1);
        registry.record_start(&slow);
        let fast = ExecutionRecord::started("job", 1);
        registry.record_start(&fast);
        assert_eq!(registry.get("job").unwrap().running, 2);

        slow.finish(ExecutionStatus::Completed, None, None);
        registry.record_complete(&slow);

        let job = registry.get("job").unwrap();
        assert_eq!(job.running, 1);
        let last = job.last_execution.unwrap();
        assert_eq!(last.execution_id, fast.execution_id);
        assert_eq!(last.status, ExecutionStatus::Running);
    }

    #[test]
    fn test_registry_list_is_sorted() {
        let registry = JobRegistry::new();
        registry.register(JobDefinition::new("c", "C", "0 * * * *"), noop());
        registry.register(JobDefinition::new("a", "A", "0 * * * *"), noop());
        registry.register(JobDefinition::new("b", "B", "0 * * * *"), noop());

        let ids: Vec<String> = registry.list().iter().map(|j| j.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_registry_unknown_job() {
        let registry = JobRegistry::new();

        assert!(registry.get("unknown").is_none());
        assert!(!registry.contains("unknown"));

        // These should not panic for unknown jobs
        registry.set_armed("unknown", Utc::now());
        registry.set_unarmed("unknown");
        registry.record_start(&ExecutionRecord::started("unknown", 1));
    }

    #[test]
    fn test_registry_serializes_without_handler() {
        let registry = JobRegistry::new();
        registry.register(JobDefinition::new("job", "Job", "0 * * * *"), noop());

        let json = serde_json::to_value(registry.get("job").unwrap()).unwrap();
        assert_eq!(json["definition"]["id"], "job");
        assert_eq!(json["armed"], false);
        assert!(json.get("handler").is_none());
    }

    #[test]
    fn test_registry_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(JobRegistry::new());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let id = format!("job-{}", i % 5);
                    registry.register(JobDefinition::new(id.clone(), "Job", "0 * * * *"), noop());
                    let mut record = ExecutionRecord::started(id, 1);
                    registry.record_start(&record);
                    record.finish(ExecutionStatus::Completed, None, None);
                    registry.record_complete(&record);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.job_count(), 5);
        let total_runs: u64 = registry.list().iter().map(|j| j.run_count).sum();
        assert_eq!(total_runs, 10);
    }
}
