use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::sweep::SweepReport;

/// Running counters for one scheduler.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    sweeps: AtomicU64,
    fired: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sweeps: u64,
    pub fired: u64,
    pub failed_dispatches: u64,
}

impl SchedulerStats {
    pub(crate) fn record(&self, report: &SweepReport) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.fired.fetch_add(u64::try_from(report.fired).unwrap_or(u64::MAX), Ordering::Relaxed);
        self.failed.fetch_add(u64::try_from(report.failed).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            failed_dispatches: self.failed.load(Ordering::Relaxed),
        }
    }
}
