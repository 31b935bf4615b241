//! Error types for the scheduler crate.
//!
//! Only two classes of failure ever reach a caller: an unknown job id and
//! misuse of the engine lifecycle. Schedule problems are reported through
//! `SchedulerError` internally but surface as `false` from the facade, and
//! handler failures are captured into execution records instead.

use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Error from the underlying tokio-cron-scheduler
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Cron expression could not be parsed or has no future occurrence
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Job not found in the registry
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The engine has been shut down and cannot be used again
    #[error("Scheduler has already been shut down")]
    AlreadyShutDown,
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        SchedulerError::Scheduler(err.to_string())
    }
}
