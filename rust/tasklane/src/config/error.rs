//! Configuration error types with actionable messages.

use std::fmt;

/// Configuration errors with enough context to fix them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A setting holds a value the runtime cannot use.
    Invalid {
        /// Which setting is wrong and why.
        message: String,
        /// How to fix it.
        fix_hint: String,
    },
    /// Several settings failed validation.
    Multiple(Vec<ConfigurationError>),
}

impl std::error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { message, fix_hint } => {
                write!(
                    f,
                    "Invalid configuration: {message}\n\nHow to fix: {fix_hint}"
                )
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple configuration errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "\n{}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl ConfigurationError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid(message: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fix_hint: fix_hint.into(),
        }
    }

    /// Collapse a list of errors: one error stays itself, several are wrapped.
    #[must_use]
    pub fn multiple(mut errors: Vec<ConfigurationError>) -> Self {
        if errors.len() == 1 {
            return errors.remove(0);
        }
        Self::Multiple(errors)
    }

    /// Number of underlying errors.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            Self::Invalid { .. } => 1,
        }
    }
}

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigurationError>;
