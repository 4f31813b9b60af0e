//! Structured logging setup and job timing.

use std::time::{Duration, Instant};

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingSettings};
use crate::runtime::ContextId;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`. Fails if a global
/// subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match settings.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_thread_names(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_thread_names(true))
            .try_init(),
    }
}

/// Times one job body on its execution context.
///
/// Logs the start on creation and the duration on [`JobTimer::finish`].
#[derive(Debug)]
pub struct JobTimer {
    /// Context name.
    name: String,
    /// Context id.
    context: ContextId,
    /// Start of the job.
    start: Instant,
}

impl JobTimer {
    #[must_use]
    pub fn start(name: impl Into<String>, context: ContextId) -> Self {
        let name = name.into();
        tracing::debug!(task = %name, context = %context, "Job started");
        Self {
            name,
            context,
            start: Instant::now(),
        }
    }

    /// Time elapsed since the job started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log the job duration.
    pub fn finish(self) {
        tracing::debug!(
            task = %self.name,
            context = %self.context,
            duration_ms = self.start.elapsed().as_millis(),
            "Job finished"
        );
    }
}
