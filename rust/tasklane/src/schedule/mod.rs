//! Recurrence rules.
//!
//! A rule maps a reference time to the next time a periodic job is due.
//! Rules are pure and stateless, so one rule value can back any number of
//! entries. Times are naive local calendar times; the scheduler supplies
//! the reference.

pub mod every;

pub use every::{Every, ParseRuleError, TimeUnit, every};

use chrono::NaiveDateTime;

/// Computes the next due time from a reference time.
///
/// Implemented by [`Every`] and by any `Fn(NaiveDateTime) -> NaiveDateTime`,
/// for schedules a fixed period cannot express. A rule should return a time
/// strictly after `reference`; one that does not makes the entry due on
/// every sweep.
pub trait Recurrence: Send + Sync + 'static {
    fn next(&self, reference: NaiveDateTime) -> NaiveDateTime;
}

impl<F> Recurrence for F
where
    F: Fn(NaiveDateTime) -> NaiveDateTime + Send + Sync + 'static,
{
    fn next(&self, reference: NaiveDateTime) -> NaiveDateTime {
        self(reference)
    }
}

/// Current local wall-clock time.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
