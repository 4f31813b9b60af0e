//! Process-wide single-scheduler slot.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DispatchError, DispatchResult};

static SCHEDULER_LIVE: AtomicBool = AtomicBool::new(false);

/// Ownership of the slot; held by the live scheduler and cleared on drop.
#[derive(Debug)]
pub(crate) struct InstanceSlot {
    _claimed: (),
}

impl InstanceSlot {
    pub(crate) fn acquire() -> DispatchResult<Self> {
        match SCHEDULER_LIVE.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Ok(Self { _claimed: () }),
            Err(_) => Err(DispatchError::SchedulerExists),
        }
    }
}

impl Drop for InstanceSlot {
    fn drop(&mut self) {
        SCHEDULER_LIVE.store(false, Ordering::Release);
    }
}

/// Whether a scheduler is currently alive in this process.
#[must_use]
pub fn scheduler_exists() -> bool {
    SCHEDULER_LIVE.load(Ordering::Acquire)
}
