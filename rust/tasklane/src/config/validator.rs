//! Settings validation.
//!
//! Rejects values the runtime cannot honour before any context is spawned.

use super::error::{ConfigResult, ConfigurationError};
use super::exec::ExecConfig;
use super::{LoggingSettings, RuntimeSettings, SchedulerSettings, Settings};

/// Validator for [`Settings`].
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate every section, collecting all problems.
    pub fn validate(settings: &Settings) -> ConfigResult<()> {
        let mut errors = Vec::new();

        for result in [
            Self::validate_exec("task", &settings.task),
            Self::validate_scheduler(&settings.scheduler),
            Self::validate_runtime(&settings.runtime),
            Self::validate_logging(&settings.logging),
        ] {
            match result {
                Ok(()) => {}
                Err(ConfigurationError::Multiple(errs)) => errors.extend(errs),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::multiple(errors))
        }
    }

    /// Validate one execution configuration; `section` prefixes messages.
    pub fn validate_exec(section: &str, exec: &ExecConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if exec.stack_size == 0 {
            errors.push(ConfigurationError::invalid(
                format!("{section}.stack_size must be positive"),
                format!("Set {section}.stack_size to a byte count such as 4096"),
            ));
        }
        if exec.name.trim().is_empty() {
            errors.push(ConfigurationError::invalid(
                format!("{section}.name must not be empty"),
                format!("Give {section}.name a short label such as \"Task\""),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::multiple(errors))
        }
    }

    fn validate_scheduler(scheduler: &SchedulerSettings) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_exec("scheduler.exec", &scheduler.exec) {
            match e {
                ConfigurationError::Multiple(errs) => errors.extend(errs),
                e => errors.push(e),
            }
        }
        if scheduler.idle_sleep_ms == 0 {
            errors.push(ConfigurationError::invalid(
                "scheduler.idle_sleep_ms is 0, an empty scheduler would spin",
                "Set scheduler.idle_sleep_ms to at least 1 (default 1000)",
            ));
        }
        if scheduler.lock_timeout_ms == 0 {
            errors.push(ConfigurationError::invalid(
                "scheduler.lock_timeout_ms is 0, bounded waits could never succeed under contention",
                "Set scheduler.lock_timeout_ms to at least 1 (default 1000)",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::multiple(errors))
        }
    }

    fn validate_runtime(runtime: &RuntimeSettings) -> ConfigResult<()> {
        if runtime.min_stack_size == 0 {
            return Err(ConfigurationError::invalid(
                "runtime.min_stack_size must be positive",
                "Set runtime.min_stack_size to a byte count such as 65536",
            ));
        }
        Ok(())
    }

    fn validate_logging(logging: &LoggingSettings) -> ConfigResult<()> {
        if logging.level.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                "logging.level must not be empty",
                "Use a tracing filter such as \"info\" or \"tasklane=debug\"",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_defaults() {
        assert!(ConfigValidator::validate(&Settings::default()).is_ok());
    }

    #[test]
    fn test_zero_stack_and_empty_name_collected() {
        let mut settings = Settings::default();
        settings.task.stack_size = 0;
        settings.task.name = "  ".to_string();

        let err = ConfigValidator::validate(&settings).expect_err("invalid task exec");
        assert_eq!(err.count(), 2);
        let msg = err.to_string();
        assert!(msg.contains("task.stack_size"));
        assert!(msg.contains("task.name"));
    }

    #[test]
    fn test_scheduler_errors_are_flattened() {
        let mut settings = Settings::default();
        settings.scheduler.exec.stack_size = 0;
        settings.scheduler.idle_sleep_ms = 0;
        settings.runtime.min_stack_size = 0;

        let err = ConfigValidator::validate(&settings).expect_err("invalid scheduler");
        assert_eq!(err.count(), 3);
        assert!(err.to_string().contains("scheduler.exec.stack_size"));
    }

    #[test]
    fn test_single_error_not_wrapped() {
        let mut settings = Settings::default();
        settings.logging.level = String::new();

        let err = ConfigValidator::validate(&settings).expect_err("empty level");
        assert!(matches!(err, ConfigurationError::Invalid { .. }));
    }
}
