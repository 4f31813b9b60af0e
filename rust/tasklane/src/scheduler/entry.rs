use chrono::{NaiveDateTime, TimeDelta};

use crate::error::DispatchResult;
use crate::runtime::{ContextId, ContextProvider};
use crate::schedule::Recurrence;
use crate::task::Fire;

/// One periodic job: a task, its rule, and when it is next due.
pub(crate) struct ScheduledEntry {
    task: Box<dyn Fire>,
    rule: Box<dyn Recurrence>,
    /// Unset until the entry is anchored to a reference time.
    next_due: Option<NaiveDateTime>,
}

impl ScheduledEntry {
    pub(crate) fn new(task: Box<dyn Fire>, rule: Box<dyn Recurrence>) -> Self {
        Self {
            task,
            rule,
            next_due: None,
        }
    }

    /// Schedule the first firing one period after `reference`, unless the
    /// entry already has a due time.
    pub(crate) fn anchor(&mut self, reference: NaiveDateTime) {
        if self.next_due.is_none() {
            self.next_due = Some(self.rule.next(reference));
        }
    }

    pub(crate) fn next_due(&self) -> Option<NaiveDateTime> {
        self.next_due
    }

    pub(crate) fn is_due(&self, now: NaiveDateTime) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    /// Advance `next_due` from `now`, then dispatch a fresh copy of the task.
    ///
    /// The due time moves even when the dispatch fails.
    pub(crate) fn fire(
        &mut self,
        now: NaiveDateTime,
        provider: &dyn ContextProvider,
    ) -> DispatchResult<Option<ContextId>> {
        self.next_due = Some(self.rule.next(now));
        self.task.fire(provider)
    }

    /// Signed time until the entry is due; zero if never anchored.
    pub(crate) fn remaining(&self, now: NaiveDateTime) -> TimeDelta {
        self.next_due.map_or(TimeDelta::zero(), |due| due - now)
    }

    pub(crate) fn name(&self) -> &str {
        self.task.name()
    }
}

impl std::fmt::Debug for ScheduledEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledEntry")
            .field("task", &self.name())
            .field("next_due", &self.next_due)
            .finish_non_exhaustive()
    }
}
