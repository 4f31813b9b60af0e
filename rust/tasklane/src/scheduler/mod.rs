//! Periodic task scheduler.
//!
//! The scheduler owns a list of entries (a task bound to a
//! [`Recurrence`]) and one background loop context. Each pass of the loop
//! takes the entry lock, fires every due entry on its own fresh context,
//! computes the time until the next entry is due, releases the lock and
//! sleeps exactly that long. Adding an entry while the loop runs wakes it
//! early so the new entry is counted in the next sleep.
//!
//! ```rust,ignore
//! use tasklane::{Every, Scheduler, Task};
//!
//! let scheduler = Scheduler::new()?;
//! scheduler.add_task(Task::new(|| println!("tick")), Every::seconds(5));
//! scheduler.run(None)?;
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!          run             pause
//!   Idle ───────▶ Running ───────▶ Paused
//!    ▲              │  ▲  resume     │
//!    └──── stop ────┘  └─────────────┘
//! ```
//!
//! Only one scheduler may exist per process. Construction fails with
//! [`DispatchError::SchedulerExists`] while another one is alive.

mod entry;
mod slot;
pub mod stats;
pub mod sweep;

pub use slot::scheduler_exists;
pub use stats::{SchedulerStats, StatsSnapshot};
pub use sweep::SweepReport;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigValidator, ExecConfig, SchedulerSettings, Settings};
use crate::error::{DispatchError, DispatchResult};
use crate::runtime::{
    ContextHandle, ContextId, ContextProvider, LoopSignal, LoopState, ThreadProvider, Wake,
    default_provider,
};
use crate::schedule::{Recurrence, local_now};
use crate::task::{Callable, Task};

use entry::ScheduledEntry;
use slot::InstanceSlot;
use sweep::{advance_clock, sweep};

/// Lifecycle state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Idle,
    Running,
    Paused,
}

/// The process-wide periodic scheduler.
///
/// Every method takes `&self`; share it with `Arc` to control it from other
/// contexts. Dropping the scheduler stops its loop and frees the
/// process-wide slot.
pub struct Scheduler {
    shared: Arc<Shared>,
    control: Mutex<Control>,
    // Dropped last so the slot is only freed after the loop has stopped.
    _slot: InstanceSlot,
}

/// State shared with the loop context.
struct Shared {
    state: Mutex<SchedulerState>,
    /// Set between `run` and `stop`.
    started: AtomicBool,
    provider: Arc<dyn ContextProvider>,
    idle_sleep: Duration,
    lock_timeout: Duration,
    stats: SchedulerStats,
}

/// Everything the sweep reads or writes, behind one lock.
struct SchedulerState {
    entries: Vec<ScheduledEntry>,
    now: Option<NaiveDateTime>,
    self_update: bool,
    /// Reference time of the last sweep and when it began; cleared by
    /// `update_now`.
    last_sweep: Option<(NaiveDateTime, Instant)>,
    /// Signal of the most recent loop; replaced by each `run`.
    signal: Option<Arc<LoopSignal>>,
}

impl SchedulerState {
    /// In self-update mode, move the reference to the last sweep's reference
    /// plus the real time since. Used when the planned sleep is cut short.
    fn rebase_clock(&mut self) {
        if !self.self_update {
            return;
        }
        if let Some((reference, started)) = self.last_sweep {
            self.now = Some(advance_clock(reference, started.elapsed(), Duration::ZERO));
        }
    }
}

/// Loop ownership, serialising run/stop/pause/resume.
struct Control {
    exec: ExecConfig,
    running: Option<RunningLoop>,
}

struct RunningLoop {
    handle: ContextHandle,
    signal: Arc<LoopSignal>,
}

impl Scheduler {
    /// Create the scheduler with default settings on the shared thread host.
    pub fn new() -> DispatchResult<Self> {
        Self::with_settings(SchedulerSettings::default())
    }

    pub fn with_settings(settings: SchedulerSettings) -> DispatchResult<Self> {
        Self::with_provider(settings, default_provider())
    }

    /// Validate `settings` and create the scheduler on a dedicated thread
    /// host configured from the `runtime` section.
    pub fn from_settings(settings: &Settings) -> DispatchResult<Self> {
        ConfigValidator::validate(settings)?;
        let provider = Arc::new(ThreadProvider::with_settings(settings.runtime.clone()));
        Self::with_provider(settings.scheduler.clone(), provider)
    }

    /// Create the scheduler with an explicit context provider.
    ///
    /// The provider runs the loop and every firing whose task has no
    /// provider of its own.
    pub fn with_provider(
        settings: SchedulerSettings,
        provider: Arc<dyn ContextProvider>,
    ) -> DispatchResult<Self> {
        let slot = InstanceSlot::acquire()?;
        tracing::debug!(
            idle_sleep_ms = settings.idle_sleep_ms,
            self_time_update = settings.self_time_update,
            "Scheduler created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    entries: Vec::new(),
                    now: None,
                    self_update: settings.self_time_update,
                    last_sweep: None,
                    signal: None,
                }),
                started: AtomicBool::new(false),
                provider,
                idle_sleep: settings.idle_sleep(),
                lock_timeout: settings.lock_timeout(),
                stats: SchedulerStats::default(),
            }),
            control: Mutex::new(Control {
                exec: settings.exec,
                running: None,
            }),
            _slot: slot,
        })
    }

    /// Register a periodic task.
    ///
    /// Blocks until the loop finishes its current sweep. A task added while
    /// the scheduler runs is due one period after the time of the call and
    /// wakes a sleeping loop; otherwise it is due one period after the time
    /// given to [`run`](Self::run).
    pub fn add_task<R: 'static>(&self, task: Task<(), R>, rule: impl Recurrence) {
        let mut state = self.shared.state.lock();
        self.insert(&mut state, task, rule);
    }

    /// Register a closure as a task with the default execution config.
    pub fn add_fn<F, R>(&self, job: F, rule: impl Recurrence)
    where
        F: Callable<(), Output = R>,
        R: 'static,
    {
        self.add_task(Task::new(job), rule);
    }

    /// [`add_task`](Self::add_task), giving up after the configured lock
    /// timeout.
    pub fn try_add_task<R: 'static>(
        &self,
        task: Task<(), R>,
        rule: impl Recurrence,
    ) -> DispatchResult<()> {
        let mut state = self.try_state()?;
        self.insert(&mut state, task, rule);
        Ok(())
    }

    /// Replace the reference time the next sweep compares against.
    pub fn update_now(&self, now: NaiveDateTime) {
        let mut state = self.shared.state.lock();
        state.now = Some(now);
        state.last_sweep = None;
        drop(state);
        tracing::trace!(now = %now, "Scheduler time updated");
    }

    /// [`update_now`](Self::update_now), giving up after the configured lock
    /// timeout.
    pub fn try_update_now(&self, now: NaiveDateTime) -> DispatchResult<()> {
        let mut state = self.try_state()?;
        state.now = Some(now);
        state.last_sweep = None;
        Ok(())
    }

    /// Whether the loop advances the reference time itself after each sweep.
    pub fn set_self_time_update(&self, enabled: bool) {
        self.shared.state.lock().self_update = enabled;
    }

    /// Execution config of the loop context; applies on the next `run`.
    pub fn set_config(&self, exec: ExecConfig) {
        self.control.lock().exec = exec;
    }

    /// Start the loop context. Does nothing if it is already running.
    ///
    /// `start` is the initial reference time. Without one the local wall
    /// clock is used and self-update is switched on, since nothing else will
    /// feed the clock.
    pub fn run(&self, start: Option<NaiveDateTime>) -> DispatchResult<()> {
        let mut control = self.control.lock();
        if control.running.is_some() {
            tracing::debug!("Scheduler already running");
            return Ok(());
        }

        let signal = Arc::new(LoopSignal::new());
        {
            let mut state = self.shared.state.lock();
            let start = start.unwrap_or_else(|| {
                state.self_update = true;
                local_now()
            });
            state.now = Some(start);
            state.last_sweep = None;
            for entry in &mut state.entries {
                entry.anchor(start);
            }
            state.signal = Some(Arc::clone(&signal));
            self.shared.started.store(true, Ordering::Release);
        }

        let shared = Arc::clone(&self.shared);
        let loop_signal = Arc::clone(&signal);
        let spawned = self.shared.provider.spawn(
            &control.exec,
            Box::new(move |id| control_loop(&shared, &loop_signal, id)),
        );

        match spawned {
            Ok(handle) => {
                tracing::info!(context = %handle.id(), entries = self.len(), "Scheduler running");
                control.running = Some(RunningLoop { handle, signal });
                Ok(())
            }
            Err(e) => {
                self.shared.state.lock().signal = None;
                self.shared.started.store(false, Ordering::Release);
                tracing::error!(error = %e, "Scheduler loop failed to start");
                Err(e)
            }
        }
    }

    /// Suspend the loop. Does nothing unless running.
    pub fn pause(&self) {
        let control = self.control.lock();
        if control
            .running
            .as_ref()
            .is_some_and(|running| running.signal.pause())
        {
            tracing::info!("Scheduler paused");
        }
    }

    /// Resume a paused loop. Does nothing unless paused.
    pub fn resume(&self) {
        let control = self.control.lock();
        if control
            .running
            .as_ref()
            .is_some_and(|running| running.signal.resume())
        {
            tracing::info!("Scheduler resumed");
        }
    }

    /// Stop the loop and return to idle. Entries keep their due times, and
    /// `run` may be called again. Jobs already dispatched run to completion.
    pub fn stop(&self) {
        let mut control = self.control.lock();
        let Some(running) = control.running.take() else {
            return;
        };

        running.signal.stop();
        if running.handle.is_current() {
            running.handle.detach();
        } else if !running.handle.join() {
            tracing::error!("Scheduler loop panicked");
        }
        self.shared.started.store(false, Ordering::Release);
        tracing::info!("Scheduler stopped");
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        match &self.control.lock().running {
            None => Lifecycle::Idle,
            Some(running) => match running.signal.state() {
                LoopState::Paused => Lifecycle::Paused,
                LoopState::Running | LoopState::Stopping => Lifecycle::Running,
            },
        }
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current reference time, if one has been set.
    #[must_use]
    pub fn now(&self) -> Option<NaiveDateTime> {
        self.shared.state.lock().now
    }

    /// Due time of every entry in registration order; `None` for entries not
    /// yet anchored.
    #[must_use]
    pub fn next_due_times(&self) -> Vec<Option<NaiveDateTime>> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .map(ScheduledEntry::next_due)
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    fn insert<R: 'static>(
        &self,
        state: &mut SchedulerState,
        task: Task<(), R>,
        rule: impl Recurrence,
    ) {
        let mut entry = ScheduledEntry::new(Box::new(task), Box::new(rule));
        if self.shared.started.load(Ordering::Acquire) {
            state.rebase_clock();
            if let Some(now) = state.now {
                entry.anchor(now);
            }
            if let Some(signal) = &state.signal {
                signal.wake();
            }
        }
        tracing::debug!(task = %entry.name(), next_due = ?entry.next_due(), "Task added");
        state.entries.push(entry);
    }

    fn try_state(&self) -> DispatchResult<MutexGuard<'_, SchedulerState>> {
        self.shared
            .state
            .try_lock_for(self.shared.lock_timeout)
            .ok_or_else(|| DispatchError::lock_timeout(self.shared.lock_timeout))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("lifecycle", &self.lifecycle())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl Shared {
    /// One locked sweep. Returns how long to sleep.
    fn sweep_once(&self) -> Duration {
        let mut state = self.state.lock();
        let started = Instant::now();
        let now = *state.now.get_or_insert_with(local_now);
        state.last_sweep = Some((now, started));

        let report = sweep(&mut state.entries, now, self.provider.as_ref());
        let sleep = report.sleep_for(self.idle_sleep);
        if state.self_update {
            state.now = Some(advance_clock(now, sleep, started.elapsed()));
        }
        drop(state);

        self.stats.record(&report);
        tracing::trace!(
            fired = report.fired,
            failed = report.failed,
            sleep_ms = sleep.as_millis(),
            "Sweep complete"
        );
        sleep
    }

    fn rebase_clock(&self) {
        self.state.lock().rebase_clock();
    }
}

fn control_loop(shared: &Shared, signal: &LoopSignal, context: ContextId) {
    tracing::info!(context = %context, "Scheduler loop started");
    while signal.checkpoint() {
        let sleep = shared.sweep_once();
        match signal.sleep(sleep) {
            Wake::Elapsed => {}
            Wake::Early => shared.rebase_clock(),
            Wake::Stopped => break,
        }
    }
    tracing::info!(context = %context, "Scheduler loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Every;
    use chrono::{NaiveDate, TimeDelta};
    use serial_test::serial;

    fn ten_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid time")
    }

    #[test]
    #[serial]
    fn test_entries_anchor_at_run() {
        let scheduler = Scheduler::new().expect("scheduler");
        scheduler.add_fn(|| {}, Every::minutes(1));
        assert_eq!(scheduler.next_due_times(), vec![None]);

        scheduler.run(Some(ten_am())).expect("run");
        assert_eq!(
            scheduler.next_due_times(),
            vec![Some(ten_am() + TimeDelta::minutes(1))]
        );
        scheduler.stop();
    }

    #[test]
    #[serial]
    fn test_add_while_running_anchors_at_reference() {
        let scheduler = Scheduler::new().expect("scheduler");
        scheduler.run(Some(ten_am())).expect("run");
        scheduler.update_now(ten_am() + TimeDelta::seconds(5));
        scheduler.add_fn(|| {}, Every::seconds(30));

        assert_eq!(
            scheduler.next_due_times(),
            vec![Some(ten_am() + TimeDelta::seconds(35))]
        );
        scheduler.stop();
        assert_eq!(scheduler.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    #[serial]
    fn test_add_while_sleeping_anchors_at_call_time() {
        let scheduler = Scheduler::new().expect("scheduler");
        scheduler.add_fn(|| {}, Every::seconds(30));
        scheduler.run(None).expect("run");
        std::thread::sleep(Duration::from_millis(100));

        // The loop planned to sleep 30s ahead; the new entry must not inherit that.
        let before = local_now();
        scheduler.add_fn(|| {}, Every::seconds(10));
        let due = scheduler.next_due_times()[1].expect("anchored");
        assert!(due <= before + TimeDelta::seconds(11), "due at {due}");
        assert!(scheduler.now().expect("reference set") < before + TimeDelta::seconds(5));
        scheduler.stop();
    }

    #[test]
    #[serial]
    fn test_from_settings_rejects_invalid_settings() {
        let mut settings = Settings::default();
        settings.scheduler.idle_sleep_ms = 0;
        settings.runtime.min_stack_size = 0;

        let err = Scheduler::from_settings(&settings).expect_err("invalid settings");
        assert!(matches!(err, DispatchError::Config(ref e) if e.count() == 2));
        assert!(!scheduler_exists());

        let scheduler = Scheduler::from_settings(&Settings::default()).expect("valid settings");
        assert_eq!(scheduler.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    #[serial]
    fn test_external_clock_is_not_advanced() {
        let scheduler = Scheduler::with_settings(SchedulerSettings {
            idle_sleep_ms: 20,
            ..SchedulerSettings::default()
        })
        .expect("scheduler");
        scheduler.run(Some(ten_am())).expect("run");
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(scheduler.now(), Some(ten_am()));
        scheduler.stop();
    }

    #[test]
    #[serial]
    fn test_run_without_time_self_updates() {
        let scheduler = Scheduler::with_settings(SchedulerSettings {
            idle_sleep_ms: 20,
            ..SchedulerSettings::default()
        })
        .expect("scheduler");
        scheduler.run(None).expect("run");
        let first = scheduler.now().expect("reference set");
        std::thread::sleep(Duration::from_millis(150));
        let later = scheduler.now().expect("reference set");
        assert!(later > first);
        assert!(scheduler.stats().sweeps >= 2);
        scheduler.stop();
    }
}
