//! Scheduler configuration.
//!
//! Covers history retention, the default history page size, the shutdown
//! grace period and whether the engine binds process termination signals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of execution records kept in memory.
    /// The oldest record is evicted first. Defaults to 1000.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Number of records returned by a history query without an explicit limit.
    /// Defaults to 10.
    #[serde(default = "default_history_limit")]
    pub default_history_limit: usize,

    /// Timeout in seconds for graceful shutdown.
    /// In-flight executions get this long to finish; they are never aborted.
    /// Defaults to 30 seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Whether `initialize()` binds SIGINT/SIGTERM to `shutdown()`.
    /// Defaults to true.
    #[serde(default = "default_install_signal_handlers")]
    pub install_signal_handlers: bool,
}

fn default_history_capacity() -> usize {
    1000
}

fn default_history_limit() -> usize {
    10
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_install_signal_handlers() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            default_history_limit: default_history_limit(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            install_signal_handlers: default_install_signal_handlers(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration suited to tests and one-shot commands: no signal
    /// handlers and a short shutdown grace period.
    pub fn detached() -> Self {
        Self {
            shutdown_timeout_secs: 1,
            install_signal_handlers: false,
            ..Default::default()
        }
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
