//! Configuration for tasks, the scheduler loop, the thread host and logging.
//!
//! Settings are loaded from, in order:
//! 1. Built-in defaults
//! 2. `.env` (if present) and the optional `config/tasklane.{toml,yaml,json}` file
//! 3. `TASKLANE__SECTION__KEY` environment variables
//!
//! ```rust,ignore
//! use tasklane::config::Settings;
//!
//! let settings = Settings::load()?;
//! tasklane::logging::init_logging(&settings.logging)?;
//! ```

pub mod error;
pub mod exec;
pub mod validator;

pub use error::{ConfigResult, ConfigurationError};
pub use exec::{Core, DEFAULT_STACK_SIZE, DEFAULT_TASK_NAME, ExecConfig, IDLE_PRIORITY};
pub use validator::ConfigValidator;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Defaults for ad-hoc tasks.
    #[serde(default)]
    pub task: ExecConfig,
    /// Scheduler loop settings.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Thread host settings.
    #[serde(default)]
    pub runtime: RuntimeSettings,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load and validate settings from the environment and config files.
    pub fn load() -> anyhow::Result<Self> {
        let settings = Self::load_unchecked()?;
        ConfigValidator::validate(&settings)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;
        Ok(settings)
    }

    /// Load settings without validation.
    pub fn load_unchecked() -> anyhow::Result<Self> {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();

        let config = ::config::Config::builder()
            .add_source(::config::File::with_name("config/tasklane").required(false))
            .add_source(
                ::config::Environment::with_prefix("TASKLANE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read tasklane configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize tasklane configuration")
    }

    /// Load and validate settings from one explicit file.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let settings: Self = config
            .try_deserialize()
            .with_context(|| format!("Failed to deserialize {}", path.display()))?;
        ConfigValidator::validate(&settings)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;
        Ok(settings)
    }
}

/// Settings for the scheduler's own control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Execution configuration of the loop context.
    #[serde(default = "default_scheduler_exec")]
    pub exec: ExecConfig,
    /// Sleep used when there are no entries to wake for (default: 1000ms).
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_ms: u64,
    /// Bound for the `try_*` operations (default: 1000ms).
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// Whether the loop advances its own time reference (default: false).
    #[serde(default)]
    pub self_time_update: bool,
}

fn default_scheduler_exec() -> ExecConfig {
    ExecConfig::named("Scheduler")
}
fn default_idle_sleep() -> u64 {
    1000
}
fn default_lock_timeout() -> u64 {
    1000
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            exec: default_scheduler_exec(),
            idle_sleep_ms: default_idle_sleep(),
            lock_timeout_ms: default_lock_timeout(),
            self_time_update: false,
        }
    }
}

impl SchedulerSettings {
    #[must_use]
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Settings for the thread-backed context host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Smallest stack handed to a host thread, in bytes (default: 64 KiB).
    #[serde(default = "default_min_stack")]
    pub min_stack_size: usize,
    /// Map task priority onto the thread nice value (default: false).
    #[serde(default)]
    pub honor_priority: bool,
}

fn default_min_stack() -> usize {
    64 * 1024
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            min_stack_size: default_min_stack(),
            honor_priority: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(ConfigValidator::validate(&settings).is_ok());
        assert_eq!(settings.scheduler.exec.name, "Scheduler");
        assert_eq!(settings.scheduler.idle_sleep(), Duration::from_secs(1));
        assert_eq!(settings.scheduler.lock_timeout(), Duration::from_secs(1));
        assert_eq!(settings.runtime.min_stack_size, 64 * 1024);
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            r#"
[task]
name = "sensor"
stack_size = 8192
pinned_core = 1

[scheduler]
idle_sleep_ms = 250
self_time_update = true

[logging]
format = "json"
"#
        )
        .expect("write config");

        let settings = Settings::load_from(file.path()).expect("settings load");
        assert_eq!(settings.task.name, "sensor");
        assert_eq!(settings.task.stack_size, 8192);
        assert_eq!(settings.task.pinned_core, Some(Core::One));
        assert_eq!(settings.scheduler.idle_sleep_ms, 250);
        assert!(settings.scheduler.self_time_update);
        assert_eq!(settings.scheduler.exec.name, "Scheduler");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(file, "[scheduler]\nidle_sleep_ms = 0\n").expect("write config");

        let err = Settings::load_from(file.path()).expect_err("zero idle sleep rejected");
        assert!(err.to_string().contains("idle_sleep_ms"));
    }
}
