//! Thread-backed execution contexts.

use std::io;
use std::sync::Arc;

use crate::config::{Core, ExecConfig, RuntimeSettings};
use crate::error::{DispatchError, DispatchResult};

use super::{ContextEntry, ContextHandle, ContextId, ContextProvider, ContextRegistry};

/// Lowest nice value the priority mapping will request.
const NICEST: u8 = 19;

/// Provider that runs every context on its own OS thread.
///
/// The requested stack size is raised to `min_stack_size`, since a host
/// thread needs far more headroom than a microcontroller task. Core pinning
/// and priority are applied from inside the new thread and are best-effort.
#[derive(Debug)]
pub struct ThreadProvider {
    registry: Arc<ContextRegistry>,
    settings: RuntimeSettings,
}

impl Default for ThreadProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(RuntimeSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: RuntimeSettings) -> Self {
        Self {
            registry: ContextRegistry::new(),
            settings,
        }
    }

    /// Registry tracking this provider's contexts.
    #[must_use]
    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    /// Stack size actually requested from the OS.
    #[must_use]
    pub fn effective_stack_size(&self, requested: usize) -> usize {
        requested.max(self.settings.min_stack_size)
    }
}

impl ContextProvider for ThreadProvider {
    fn spawn(&self, config: &ExecConfig, entry: ContextEntry) -> DispatchResult<ContextHandle> {
        let slot = self.registry.reserve(&config.name);
        let id = slot.id();
        let placement = Placement {
            core: config.pinned_core,
            nice: self
                .settings
                .honor_priority
                .then(|| nice_for(config.priority)),
        };

        let thread = std::thread::Builder::new()
            .name(config.name.replace('\0', ""))
            .stack_size(self.effective_stack_size(config.stack_size))
            .spawn(move || {
                let _slot = slot;
                placement.apply(id);
                entry(id);
            })
            .map_err(|e| {
                tracing::warn!(task = %config.name, error = %e, "Context creation refused");
                DispatchError::spawn(&config.name, e)
            })?;

        self.registry.record_spawn();
        tracing::trace!(task = %config.name, context = %id, "Context spawned");
        Ok(ContextHandle::new(id, config.name.clone(), Some(thread)))
    }
}

/// Map a priority (0 = idle) onto a nice value (19 = nicest).
fn nice_for(priority: u8) -> i32 {
    i32::from(NICEST - priority.min(NICEST))
}

/// Placement applied by a context to itself on startup.
#[derive(Debug, Clone, Copy)]
struct Placement {
    core: Option<Core>,
    nice: Option<i32>,
}

impl Placement {
    fn apply(self, context: ContextId) {
        if let Some((core, Err(e))) = self.core.map(|core| (core, pin_current_thread(core))) {
            tracing::debug!(context = %context, core = %core, error = %e, "Core pinning not applied");
        }
        if let Some((nice, Err(e))) = self.nice.map(|nice| (nice, set_current_nice(nice))) {
            tracing::debug!(context = %context, nice, error = %e, "Priority not applied");
        }
    }
}

#[cfg(target_os = "linux")]
fn pin_current_thread(core: Core) -> io::Result<()> {
    // SAFETY: cpu_set_t is plain bit storage and all-zero is the empty set.
    // CPU_SET writes within the set for any index below CPU_SETSIZE, and
    // sched_setaffinity with pid 0 only reads `set` for the calling thread.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core.index(), &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread(_core: Core) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "core pinning is only available on Linux",
    ))
}

#[cfg(target_os = "linux")]
fn set_current_nice(nice: i32) -> io::Result<()> {
    // SAFETY: setpriority takes no pointers; on Linux `who == 0` with
    // PRIO_PROCESS addresses the calling thread only.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
fn set_current_nice(_nice: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "per-thread priority is only available on Linux",
    ))
}
