use thiserror::Error;

use crate::config::ConfigurationError;

/// Core error type for task dispatch and scheduling.
///
/// Only resource acquisition can fail: the process-wide scheduler slot,
/// execution contexts, and bounded lock waits. Time arithmetic is total.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A scheduler is already alive in this process.
    #[error("Only one scheduler may exist at a time")]
    SchedulerExists,

    /// The host refused to create an execution context.
    #[error("Failed to spawn execution context '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A bounded lock acquisition gave up.
    #[error("Timed out after {millis} ms waiting for the scheduler lock")]
    LockTimeout { millis: u64 },

    /// Settings failed validation.
    #[error(transparent)]
    Config(#[from] ConfigurationError),
}

/// Result type alias for dispatch and scheduler operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Create a spawn failure for the named context.
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        DispatchError::Spawn {
            name: name.into(),
            source,
        }
    }

    /// Create a lock timeout from the duration that was waited.
    pub fn lock_timeout(waited: std::time::Duration) -> Self {
        DispatchError::LockTimeout {
            millis: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
