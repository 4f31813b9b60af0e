//! Dispatchable tasks.
//!
//! A [`Task`] is a template: a job, an optional completion callback and the
//! [`ExecConfig`] of the context it runs on. Every [`Task::dispatch`] moves a
//! fresh copy of the job and its arguments onto a new execution context,
//! runs it once, runs the callback with the result, and lets the context
//! finish. The caller never waits.
//!
//! ```rust,ignore
//! use tasklane::task::Task;
//!
//! let add = Task::new(|a: i32, b: i32| a + b)
//!     .on_complete(|sum: i32| println!("sum = {sum}"));
//! add.dispatch((2, 3))?;
//! ```

pub mod callable;

pub use callable::{Callable, Callback, OnComplete, WithResult, WithoutResult};

use std::fmt;
use std::sync::Arc;

use crate::config::ExecConfig;
use crate::error::DispatchResult;
use crate::logging::JobTimer;
use crate::runtime::{ContextId, ContextProvider, default_thread_provider};

/// A job template that can be dispatched any number of times.
pub struct Task<Args = (), R = ()> {
    job: Option<Arc<dyn Callable<Args, Output = R>>>,
    callback: Option<Callback<R>>,
    config: ExecConfig,
    provider: Option<Arc<dyn ContextProvider>>,
}

impl<Args, R> Task<Args, R> {
    /// A task with no job; dispatching it does nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            job: None,
            callback: None,
            config: ExecConfig::default(),
            provider: None,
        }
    }

    #[must_use]
    pub fn set_config(mut self, config: ExecConfig) -> Self {
        self.config = config;
        self
    }

    /// Run firings on `provider` instead of the process-wide thread host.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn has_callable(&self) -> bool {
        self.job.is_some()
    }

    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl<Args, R> Task<Args, R>
where
    Args: Send + 'static,
    R: 'static,
{
    #[must_use]
    pub fn new<F>(job: F) -> Self
    where
        F: Callable<Args, Output = R>,
    {
        Self::empty().set_callable(job)
    }

    #[must_use]
    pub fn with_config<F>(job: F, config: ExecConfig) -> Self
    where
        F: Callable<Args, Output = R>,
    {
        Self::new(job).set_config(config)
    }

    #[must_use]
    pub fn set_callable<F>(mut self, job: F) -> Self
    where
        F: Callable<Args, Output = R>,
    {
        self.job = Some(Arc::new(job));
        self
    }

    /// Set the callback run on the firing context after the job returns.
    #[must_use]
    pub fn on_complete<M, C>(mut self, callback: C) -> Self
    where
        C: OnComplete<R, M>,
    {
        self.callback = Some(callback.into_callback());
        self
    }

    /// Run the job once on a new execution context.
    ///
    /// Returns `Ok(None)` without spawning anything when no job is set, and
    /// the new context's id otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`](crate::error::DispatchError::Spawn)
    /// if the host refuses to create the context. The arguments are dropped.
    pub fn dispatch(&self, args: Args) -> DispatchResult<Option<ContextId>> {
        match &self.provider {
            Some(provider) => self.dispatch_on(provider.as_ref(), args),
            None => self.dispatch_on(default_thread_provider().as_ref(), args),
        }
    }

    /// Dispatch on the task's own provider if it has one, else `fallback`.
    pub(crate) fn dispatch_or(
        &self,
        fallback: &dyn ContextProvider,
        args: Args,
    ) -> DispatchResult<Option<ContextId>> {
        match &self.provider {
            Some(provider) => self.dispatch_on(provider.as_ref(), args),
            None => self.dispatch_on(fallback, args),
        }
    }

    fn dispatch_on(
        &self,
        provider: &dyn ContextProvider,
        args: Args,
    ) -> DispatchResult<Option<ContextId>> {
        let Some(job) = &self.job else {
            tracing::trace!(task = %self.config.name, "No job set, nothing to dispatch");
            return Ok(None);
        };

        let firing = Firing {
            job: Arc::clone(job),
            callback: self.callback.clone(),
            args,
            name: self.config.name.clone(),
        };
        let handle = provider.spawn(&self.config, Box::new(move |id| firing.run(id)))?;
        let id = handle.id();
        handle.detach();
        Ok(Some(id))
    }
}

impl<Args, R> Default for Task<Args, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<Args, R> Clone for Task<Args, R> {
    fn clone(&self) -> Self {
        Self {
            job: self.job.clone(),
            callback: self.callback.clone(),
            config: self.config.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<Args, R> fmt::Debug for Task<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("config", &self.config)
            .field("has_callable", &self.has_callable())
            .field("has_callback", &self.has_callback())
            .field("provider", &self.provider)
            .finish()
    }
}

/// One dispatch's private copy of the job, owned by its context.
struct Firing<Args, R> {
    job: Arc<dyn Callable<Args, Output = R>>,
    callback: Option<Callback<R>>,
    args: Args,
    name: String,
}

impl<Args: 'static, R: 'static> Firing<Args, R> {
    fn run(self, context: ContextId) {
        let timer = JobTimer::start(self.name, context);
        let result = self.job.call(self.args);
        if let Some(callback) = &self.callback {
            callback(result);
        }
        timer.finish();
    }
}

/// A zero-argument task as seen by the scheduler.
pub(crate) trait Fire: Send {
    fn fire(&self, fallback: &dyn ContextProvider) -> DispatchResult<Option<ContextId>>;

    fn name(&self) -> &str;
}

impl<R: 'static> Fire for Task<(), R> {
    fn fire(&self, fallback: &dyn ContextProvider) -> DispatchResult<Option<ContextId>> {
        self.dispatch_or(fallback, ())
    }

    fn name(&self) -> &str {
        Task::name(self)
    }
}
