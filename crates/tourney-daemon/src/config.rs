//! Daemon settings.
//!
//! Loaded in layers, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `<config dir>/tourney-scheduler/config.toml` (optional)
//! 3. `--config` file (required if given)
//! 4. `TOURNEY_*` environment variables, `__` between nested keys
//!    (e.g. `TOURNEY_REMINDER_JOB__CRON`)
//! 5. CLI flags, applied by the caller

use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File, Map};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use tourney_jobs::{ReminderJobConfig, TournamentLifecycleJobConfig};
use tourney_scheduler::SchedulerConfig;

/// Settings for the daemon process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log filter used when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON fixture of tournaments and scores loaded into the in-memory store
    #[serde(default)]
    pub seed_path: Option<String>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub lifecycle_job: TournamentLifecycleJobConfig,

    #[serde(default)]
    pub reminder_job: ReminderJobConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            seed_path: None,
            scheduler: SchedulerConfig::default(),
            lifecycle_job: TournamentLifecycleJobConfig::default(),
            reminder_job: ReminderJobConfig::default(),
        }
    }
}

/// Directory holding the default config file.
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("", "", "tourney-scheduler")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Settings {
    /// Load settings from defaults, config files and the environment.
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with_env(cli_config_path, None)
    }

    /// Like [`Settings::load`], but reads `TOURNEY_*` variables from `env`
    /// instead of the process environment when it is `Some`.
    pub fn load_with_env(
        cli_config_path: Option<&str>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let default_config_path = config_dir().join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("TOURNEY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        builder.build()?.try_deserialize()
    }

    /// `seed_path` with a leading `~` expanded.
    pub fn expanded_seed_path(&self) -> Option<PathBuf> {
        self.seed_path
            .as_deref()
            .map(|path| PathBuf::from(shellexpand::tilde(path).into_owned()))
    }
}
