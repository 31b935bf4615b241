//! Job definitions, execution context/outcome and execution records.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque key/value bag passed from a trigger or manual caller to a handler.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Retry settings carried on a job definition.
///
/// The engine stores and reports these values but never re-invokes a failed
/// execution; every execution runs with `attempt == 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each retry
    pub backoff_multiplier: f64,
    /// Upper bound for the retry delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 60_000,
        }
    }
}

/// Static description of a unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique, immutable key of the job
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Cron expression (5 fields, or 6 with leading seconds), evaluated in UTC
    pub schedule: String,
    /// Whether the job is armed on registration and initialization
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum wall-clock time for one execution in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Retry settings, reported but not executed
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    /// Intended cap on simultaneous executions, reported but not enforced
    #[serde(default)]
    pub concurrency_limit: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl JobDefinition {
    /// Create an enabled job definition without timeout.
    pub fn new(id: impl Into<String>, name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            schedule: schedule.into(),
            enabled: true,
            timeout_ms: None,
            retry_policy: None,
            concurrency_limit: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_concurrency_limit(mut self, limit: u32) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    /// Execution timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Per-invocation input handed to a job handler.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_id: String,
    pub execution_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Always 1: the engine does not retry.
    pub attempt: u32,
    pub metadata: Metadata,
    /// Cancelled when the engine shuts down. Handlers may watch it to stop
    /// early; the engine never aborts them.
    pub shutdown: CancellationToken,
}

/// Result declared by a handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Time the handler measured for its own work. Zero when not reported.
    /// Logged next to the engine's wall-clock measurement.
    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionOutcome {
    /// Successful outcome carrying an optional payload.
    pub fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            error: None,
            data,
            duration_ms: 0,
        }
    }

    /// Failed outcome with an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: None,
            duration_ms: 0,
        }
    }

    /// Attach the handler's own timing.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// State of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Engine-owned history entry for one execution.
///
/// Created as `Running` when the execution starts and finalized exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub job_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub attempt: u32,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl ExecutionRecord {
    /// Create a running record with a fresh execution id.
    pub fn started(job_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            job_id: job_id.into(),
            start_time: Utc::now(),
            end_time: None,
            status: ExecutionStatus::Running,
            attempt,
            error: None,
            result: None,
        }
    }

    /// Finalize the record. Has no effect on a record that is already finished.
    ///
    /// Returns `true` if the record was updated.
    pub fn finish(
        &mut self,
        status: ExecutionStatus,
        error: Option<String>,
        result: Option<serde_json::Value>,
    ) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error;
        self.result = result;
        self.end_time = Some(Utc::now());
        true
    }

    /// Wall-clock duration of a finished execution.
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0) as u64)
    }
}
