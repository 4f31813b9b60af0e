//! Execution-context host.
//!
//! An execution context is an independent unit of concurrent execution that
//! runs one entry point to completion and is then reclaimed. The
//! [`ContextProvider`] trait is the seam to the host; [`ThreadProvider`]
//! backs contexts with OS threads.
//!
//! - [`registry`]: live-context bookkeeping, one slot per context
//! - [`thread`]: the thread-backed provider, stack floor, core pinning
//! - [`signal`]: cooperative suspend/resume/stop for long-lived loops

pub mod registry;
pub mod signal;
pub mod thread;

pub use registry::{ContextRegistry, ContextSlot};
pub use signal::{LoopSignal, LoopState, Wake};
pub use thread::ThreadProvider;

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::thread::JoinHandle;

use crate::config::ExecConfig;
use crate::error::DispatchResult;

/// Identifier of one execution context, unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Entry point run by a new context; receives the context's own id.
pub type ContextEntry = Box<dyn FnOnce(ContextId) + Send + 'static>;

/// Creates execution contexts.
pub trait ContextProvider: Send + Sync + fmt::Debug {
    /// Start a context running `entry` with the given configuration.
    ///
    /// On failure `entry` has been dropped and nothing stays allocated.
    fn spawn(&self, config: &ExecConfig, entry: ContextEntry) -> DispatchResult<ContextHandle>;
}

/// Handle to a spawned context.
///
/// Dropping or [detaching](ContextHandle::detach) the handle leaves the
/// context running to completion on its own.
#[derive(Debug)]
pub struct ContextHandle {
    id: ContextId,
    name: String,
    thread: Option<JoinHandle<()>>,
}

impl ContextHandle {
    #[must_use]
    pub fn new(id: ContextId, name: impl Into<String>, thread: Option<JoinHandle<()>>) -> Self {
        Self {
            id,
            name: name.into(),
            thread,
        }
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the caller is running on this context.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == std::thread::current().id())
    }

    /// Whether the context has run to completion.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the context to finish. Returns `false` if it panicked.
    pub fn join(mut self) -> bool {
        match self.thread.take() {
            Some(thread) => thread.join().is_ok(),
            None => true,
        }
    }

    /// Let the context run on unobserved.
    pub fn detach(self) {}
}

static DEFAULT_PROVIDER: LazyLock<Arc<ThreadProvider>> =
    LazyLock::new(|| Arc::new(ThreadProvider::new()));

/// The process-wide thread provider used when none is given explicitly.
#[must_use]
pub fn default_thread_provider() -> Arc<ThreadProvider> {
    Arc::clone(&DEFAULT_PROVIDER)
}

/// [`default_thread_provider`] as a trait object.
#[must_use]
pub fn default_provider() -> Arc<dyn ContextProvider> {
    default_thread_provider()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_display() {
        assert_eq!(ContextId::new(42).to_string(), "ctx-42");
        assert_eq!(ContextId::new(42).get(), 42);
    }

    #[test]
    fn test_threadless_handle() {
        let handle = ContextHandle::new(ContextId::new(1), "inline", None);
        assert_eq!(handle.name(), "inline");
        assert!(!handle.is_current());
        assert!(handle.is_finished());
        assert!(handle.join());
    }

    #[test]
    fn test_default_provider_is_shared() {
        let a = default_thread_provider();
        let b = default_thread_provider();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
