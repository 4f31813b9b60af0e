//! One pass of the control loop over the entry list.
//!
//! Kept free of locking and sleeping so the timing rules can be checked
//! against a simulated clock.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

use super::entry::ScheduledEntry;
use crate::runtime::ContextProvider;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries dispatched.
    pub fired: usize,
    /// Entries whose dispatch was refused by the host.
    pub failed: usize,
    /// Smallest signed time until an entry is due; `None` with no entries.
    pub min_remaining: Option<TimeDelta>,
}

impl SweepReport {
    /// How long the loop should sleep. Overdue time floors at zero; with no
    /// entries the loop sleeps `idle`.
    #[must_use]
    pub fn sleep_for(&self, idle: Duration) -> Duration {
        match self.min_remaining {
            Some(remaining) => remaining.to_std().unwrap_or(Duration::ZERO),
            None => idle,
        }
    }
}

/// Fire every due entry and find the next wake-up.
///
/// Entries that were never anchored are anchored at `now` first. A refused
/// dispatch is counted and logged; the entry keeps its advanced due time.
pub(crate) fn sweep(
    entries: &mut [ScheduledEntry],
    now: NaiveDateTime,
    provider: &dyn ContextProvider,
) -> SweepReport {
    let mut report = SweepReport::default();

    for entry in entries.iter_mut() {
        entry.anchor(now);

        if entry.is_due(now) {
            match entry.fire(now, provider) {
                Ok(Some(context)) => {
                    report.fired += 1;
                    tracing::debug!(
                        task = %entry.name(),
                        context = %context,
                        next_due = ?entry.next_due(),
                        "Task fired"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        task = %entry.name(),
                        error = %e,
                        next_due = ?entry.next_due(),
                        "Dispatch failed, skipping this firing"
                    );
                }
            }
        }

        let remaining = entry.remaining(now);
        report.min_remaining = Some(
            report
                .min_remaining
                .map_or(remaining, |min| min.min(remaining)),
        );
    }

    report
}

/// Advance a self-updated reference time by the planned sleep plus the time
/// the sweep itself took. Saturates at the end of the calendar.
pub(crate) fn advance_clock(now: NaiveDateTime, sleep: Duration, cost: Duration) -> NaiveDateTime {
    TimeDelta::from_std(sleep.saturating_add(cost))
        .ok()
        .and_then(|step| now.checked_add_signed(step))
        .unwrap_or(NaiveDateTime::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecConfig;
    use crate::error::{DispatchError, DispatchResult};
    use crate::runtime::{ContextEntry, ContextHandle, ContextId};
    use crate::schedule::{Every, Recurrence, TimeUnit, every};
    use crate::task::Task;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Runs each entry point inline on the calling thread.
    #[derive(Debug, Default)]
    struct InlineProvider {
        next: AtomicU64,
    }

    impl ContextProvider for InlineProvider {
        fn spawn(&self, config: &ExecConfig, entry: ContextEntry) -> DispatchResult<ContextHandle> {
            let id = ContextId::new(self.next.fetch_add(1, Ordering::Relaxed) + 1);
            entry(id);
            Ok(ContextHandle::new(id, config.name.clone(), None))
        }
    }

    #[derive(Debug)]
    struct RefusingProvider;

    impl ContextProvider for RefusingProvider {
        fn spawn(&self, config: &ExecConfig, _entry: ContextEntry) -> DispatchResult<ContextHandle> {
            Err(DispatchError::spawn(
                &config.name,
                std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no memory"),
            ))
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid time")
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    fn logging_entry(
        name: &str,
        log: &Arc<Mutex<Vec<String>>>,
        rule: impl Recurrence,
    ) -> ScheduledEntry {
        let log = Arc::clone(log);
        let label = name.to_string();
        let task = Task::new(move || log.lock().push(label.clone()))
            .set_config(ExecConfig::named(name));
        ScheduledEntry::new(Box::new(task), Box::new(rule))
    }

    fn fixed_entry(due: NaiveDateTime) -> ScheduledEntry {
        let mut entry = ScheduledEntry::new(Box::new(Task::new(|| {})), Box::new(Every::seconds(10)));
        entry.anchor(due - secs(10));
        entry
    }

    #[test]
    fn test_min_remaining_over_all_entries() {
        let now = t0();
        let mut entries = vec![
            fixed_entry(now + secs(5)),
            fixed_entry(now + secs(2)),
            fixed_entry(now + secs(9)),
        ];

        let report = sweep(&mut entries, now, &InlineProvider::default());
        assert_eq!(report.fired, 0);
        assert_eq!(report.min_remaining, Some(secs(2)));
        assert_eq!(report.sleep_for(Duration::from_secs(1)), Duration::from_secs(2));
    }

    #[test]
    fn test_only_due_entries_fire() {
        let now = t0();
        let mut entries = vec![
            fixed_entry(now - secs(1)),
            fixed_entry(now),
            fixed_entry(now + secs(1)),
        ];

        let report = sweep(&mut entries, now, &InlineProvider::default());
        assert_eq!(report.fired, 2);
        assert_eq!(entries[0].next_due(), Some(now + secs(10)));
        assert_eq!(entries[1].next_due(), Some(now + secs(10)));
        assert_eq!(entries[2].next_due(), Some(now + secs(1)));
        assert_eq!(report.min_remaining, Some(secs(1)));
    }

    #[test]
    fn test_late_wake_fires_once_from_current_time() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut entries = vec![logging_entry("late", &log, Every::seconds(30))];
        entries[0].anchor(t0());

        // Woke 7s after the entry was due.
        let now = t0() + secs(37);
        let report = sweep(&mut entries, now, &InlineProvider::default());

        assert_eq!(report.fired, 1);
        assert_eq!(log.lock().len(), 1);
        assert_eq!(entries[0].next_due(), Some(now + secs(30)));
        assert_eq!(report.min_remaining, Some(secs(30)));
    }

    #[test]
    fn test_one_minute_rule_sleeps_sixty_seconds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut entries = vec![logging_entry("minutely", &log, every(1, TimeUnit::Minutes))];

        let report = sweep(&mut entries, t0(), &InlineProvider::default());
        assert_eq!(report.fired, 0);
        assert_eq!(entries[0].next_due(), Some(t0() + secs(60)));
        assert_eq!(report.sleep_for(Duration::ZERO), Duration::from_secs(60));
    }

    #[test]
    fn test_two_rules_fire_in_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut entries = vec![
            logging_entry("A", &log, every(30, TimeUnit::Seconds)),
            logging_entry("B", &log, every(90, TimeUnit::Seconds)),
        ];
        let provider = InlineProvider::default();

        let mut now = t0();
        let mut fired_at = Vec::new();
        while now <= t0() + secs(120) {
            let report = sweep(&mut entries, now, &provider);
            let mut names: Vec<String> = log.lock().drain(..).collect();
            names.sort();
            if !names.is_empty() {
                fired_at.push(((now - t0()).num_seconds(), names));
            }
            now = advance_clock(now, report.sleep_for(Duration::ZERO), Duration::ZERO);
        }

        let expected: Vec<(i64, Vec<String>)> = vec![
            (30, vec!["A".into()]),
            (60, vec!["A".into()]),
            (90, vec!["A".into(), "B".into()]),
            (120, vec!["A".into()]),
        ];
        assert_eq!(fired_at, expected);
    }

    #[test]
    fn test_refused_dispatch_keeps_sweeping() {
        let now = t0();
        let mut entries = vec![fixed_entry(now), fixed_entry(now + secs(4))];

        let report = sweep(&mut entries, now, &RefusingProvider);
        assert_eq!(report.fired, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(entries[0].next_due(), Some(now + secs(10)));
        assert_eq!(report.min_remaining, Some(secs(4)));
    }

    #[test]
    fn test_empty_task_is_not_counted() {
        let now = t0();
        let mut entry = ScheduledEntry::new(Box::new(Task::<(), ()>::empty()), Box::new(Every::seconds(5)));
        entry.anchor(now - secs(5));
        let mut entries = vec![entry];

        let report = sweep(&mut entries, now, &RefusingProvider);
        assert_eq!(report, SweepReport {
            fired: 0,
            failed: 0,
            min_remaining: Some(secs(5)),
        });
    }

    #[test]
    fn test_sleep_floors_and_idles() {
        let overdue = SweepReport {
            min_remaining: Some(secs(-3)),
            ..SweepReport::default()
        };
        assert_eq!(overdue.sleep_for(Duration::from_secs(1)), Duration::ZERO);

        let empty = SweepReport::default();
        assert_eq!(empty.sleep_for(Duration::from_millis(250)), Duration::from_millis(250));
    }

    #[test]
    fn test_advance_clock_adds_sleep_and_cost() {
        let next = advance_clock(t0(), Duration::from_secs(2), Duration::from_millis(15));
        assert_eq!(next, t0() + TimeDelta::milliseconds(2015));
        assert_eq!(
            advance_clock(NaiveDateTime::MAX, Duration::from_secs(1), Duration::ZERO),
            NaiveDateTime::MAX
        );
    }
}
