//! Live execution-context bookkeeping.
//!
//! Every context owns exactly one [`ContextSlot`]. The slot is reserved
//! before the host is asked to start the context and is released when the
//! slot is dropped: after the entry point returns, while unwinding from a
//! panic, or immediately if the host refuses to start the context.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::ContextId;

/// Registry of live contexts.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    /// Last id handed out.
    next_id: AtomicU64,
    /// Contexts that actually started.
    spawned: AtomicU64,
    /// Live slots by id, with the context name.
    live: Mutex<HashMap<ContextId, String>>,
    /// Signalled when the last live slot is released.
    idle: Condvar,
}

impl ContextRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve a slot for a context about to be started.
    #[must_use]
    pub fn reserve(self: &Arc<Self>, name: &str) -> ContextSlot {
        let id = ContextId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.live.lock().insert(id, name.to_string());
        ContextSlot {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Count a context the host accepted.
    pub fn record_spawn(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of contexts whose slot is still held.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.lock().len()
    }

    /// Names of the live contexts, sorted.
    #[must_use]
    pub fn live_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.live.lock().values().cloned().collect();
        names.sort();
        names
    }

    /// Contexts started since the registry was created.
    #[must_use]
    pub fn spawned_total(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Block until no context is live. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut live = self.live.lock();
        while !live.is_empty() {
            if self.idle.wait_until(&mut live, deadline).timed_out() {
                return live.is_empty();
            }
        }
        true
    }

    fn release(&self, id: ContextId) {
        let mut live = self.live.lock();
        live.remove(&id);
        if live.is_empty() {
            self.idle.notify_all();
        }
    }
}

/// One live context's claim on the registry; released on drop.
#[derive(Debug)]
pub struct ContextSlot {
    registry: Arc<ContextRegistry>,
    id: ContextId,
}

impl ContextSlot {
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl Drop for ContextSlot {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
