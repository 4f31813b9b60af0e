//! Cooperative suspend/resume/stop for a long-lived loop context.
//!
//! The loop calls [`LoopSignal::checkpoint`] before each unit of work and
//! [`LoopSignal::sleep`] between units. Both block while paused; `stop`
//! interrupts either immediately. [`LoopSignal::wake`] cuts a sleep short
//! without changing state.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Requested state of a loop context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Working normally.
    Running,
    /// Suspended until resumed.
    Paused,
    /// Asked to exit.
    Stopping,
}

/// How a [`LoopSignal::sleep`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full duration passed.
    Elapsed,
    /// Cut short by [`LoopSignal::wake`].
    Early,
    /// The loop was asked to exit.
    Stopped,
}

impl Wake {
    /// Whether the loop should keep going.
    #[must_use]
    pub fn proceed(self) -> bool {
        self != Self::Stopped
    }
}

#[derive(Debug)]
struct Inner {
    state: LoopState,
    wake: bool,
}

/// Control channel between a loop context and its owner.
#[derive(Debug)]
pub struct LoopSignal {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Default for LoopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LoopState::Running,
                wake: false,
            }),
            changed: Condvar::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.inner.lock().state
    }

    /// Running → Paused. Returns whether the state changed.
    pub fn pause(&self) -> bool {
        self.transition(LoopState::Running, LoopState::Paused)
    }

    /// Paused → Running. Returns whether the state changed.
    pub fn resume(&self) -> bool {
        self.transition(LoopState::Paused, LoopState::Running)
    }

    /// Ask the loop to exit, from any state.
    pub fn stop(&self) {
        self.inner.lock().state = LoopState::Stopping;
        self.changed.notify_all();
    }

    /// End the current or next sleep early. A paused loop still waits for
    /// resume.
    pub fn wake(&self) {
        self.inner.lock().wake = true;
        self.changed.notify_all();
    }

    /// Wait out a pause. Returns `false` once the loop should exit.
    pub fn checkpoint(&self) -> bool {
        let mut inner = self.inner.lock();
        loop {
            match inner.state {
                LoopState::Running => return true,
                LoopState::Stopping => return false,
                LoopState::Paused => self.changed.wait(&mut inner),
            }
        }
    }

    /// Sleep for `duration`, not returning while paused.
    ///
    /// A sleep that expires during a pause completes on resume. A pending
    /// [`wake`](Self::wake) is consumed here.
    pub fn sleep(&self, duration: Duration) -> Wake {
        let deadline = Instant::now().checked_add(duration);
        let mut inner = self.inner.lock();
        loop {
            match inner.state {
                LoopState::Stopping => return Wake::Stopped,
                LoopState::Paused => self.changed.wait(&mut inner),
                LoopState::Running if inner.wake => {
                    inner.wake = false;
                    return Wake::Early;
                }
                LoopState::Running => match deadline {
                    Some(deadline) if Instant::now() >= deadline => return Wake::Elapsed,
                    Some(deadline) => {
                        self.changed.wait_until(&mut inner, deadline);
                    }
                    None => self.changed.wait(&mut inner),
                },
            }
        }
    }

    fn transition(&self, from: LoopState, to: LoopState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != from {
            return false;
        }
        inner.state = to;
        self.changed.notify_all();
        true
    }
}
