//! In-process cron job engine for the tournament service.
//!
//! Registers named, cron-triggered jobs, runs them on a timer or on demand,
//! enforces per-job timeouts, keeps an in-memory execution history and shuts
//! down cleanly. Built on `tokio-cron-scheduler`; every schedule is
//! evaluated in UTC.
//!
//! # Components
//!
//! - [`JobRegistry`]: job definitions, handlers and status counters
//! - [`TriggerEngine`]: one armed cron trigger per enabled job
//! - [`ExecutionRunner`]: runs a handler against its timeout and records the result
//! - [`HistoryLedger`]: size-capped execution history, newest first
//! - [`SchedulerService`]: facade and lifecycle (`initialize` / `shutdown`)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tourney_scheduler::{handler_fn, ExecutionOutcome, JobDefinition, SchedulerConfig, SchedulerService};
//!
//! let scheduler = Arc::new(SchedulerService::new(SchedulerConfig::default()).await?);
//!
//! scheduler.register_job(
//!     JobDefinition::new("cleanup", "Cleanup", "0 * * * *")
//!         .with_timeout(Duration::from_secs(60)),
//!     handler_fn(|_ctx| async { Ok(ExecutionOutcome::success(None)) }),
//! ).await;
//!
//! scheduler.initialize().await?;
//! let record = scheduler.execute_job("cleanup", Default::default()).await?;
//! let history = scheduler.get_execution_history(Some("cleanup"), None);
//!
//! scheduler.shutdown().await;
//! ```

mod config;
mod error;
mod handler;
mod history;
mod lifecycle;
mod registry;
mod runner;
mod schedule;
mod scheduler;
mod trigger;
mod types;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use handler::{handler_fn, JobHandler, SharedHandler};
pub use history::HistoryLedger;
pub use lifecycle::{shutdown_signal, LifecycleState};
pub use registry::{JobRegistry, RegisteredJob};
pub use runner::{ExecutionRunner, TRIGGER_KEY};
pub use schedule::{next_execution_time, normalize_cron_expression, validate_cron_expression};
pub use scheduler::SchedulerService;
pub use trigger::TriggerEngine;
pub use types::{
    ExecutionContext, ExecutionOutcome, ExecutionRecord, ExecutionStatus, JobDefinition, Metadata,
    RetryPolicy,
};
