//! Fixed-period recurrence: every N seconds, minutes, hours or days.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Recurrence;

/// Calendar unit of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }

    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeUnit {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            _ => Err(ParseRuleError::new(s, "unknown time unit")),
        }
    }
}

/// Error parsing a [`TimeUnit`] or [`Every`] from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid recurrence '{input}': {reason}")]
pub struct ParseRuleError {
    pub input: String,
    pub reason: &'static str,
}

impl ParseRuleError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Adds a fixed `amount` of `unit` to the reference time.
///
/// The amount is always at least one, so `next` is strictly later than the
/// reference unless the calendar range is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Every {
    amount: u32,
    unit: TimeUnit,
}

/// A rule firing every `amount` `unit`s. An amount of zero is raised to one.
#[must_use]
pub fn every(amount: u32, unit: TimeUnit) -> Every {
    if amount == 0 {
        tracing::warn!(unit = %unit, "Recurrence amount of zero raised to one");
    }
    Every {
        amount: amount.max(1),
        unit,
    }
}

impl Every {
    #[must_use]
    pub fn seconds(amount: u32) -> Self {
        every(amount, TimeUnit::Seconds)
    }

    #[must_use]
    pub fn minutes(amount: u32) -> Self {
        every(amount, TimeUnit::Minutes)
    }

    #[must_use]
    pub fn hours(amount: u32) -> Self {
        every(amount, TimeUnit::Hours)
    }

    #[must_use]
    pub fn days(amount: u32) -> Self {
        every(amount, TimeUnit::Days)
    }

    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// The period as a signed duration.
    #[must_use]
    pub fn period(&self) -> TimeDelta {
        // u32::MAX days is well inside TimeDelta's range.
        TimeDelta::seconds(i64::from(self.amount) * self.unit.seconds())
    }
}

impl Default for Every {
    fn default() -> Self {
        Self::seconds(60)
    }
}

impl Recurrence for Every {
    fn next(&self, reference: NaiveDateTime) -> NaiveDateTime {
        reference
            .checked_add_signed(self.period())
            .unwrap_or(NaiveDateTime::MAX)
    }
}

impl fmt::Display for Every {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for Every {
    type Err = ParseRuleError;

    /// Parse `"30s"`, `"5m"`, `"1h"`, `"2d"` or `"10 minutes"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ParseRuleError::new(s, "missing time unit"))?;
        let (digits, unit) = trimmed.split_at(split);
        if digits.is_empty() {
            return Err(ParseRuleError::new(s, "missing amount"));
        }
        let amount = digits
            .parse::<u32>()
            .ok()
            .ok_or_else(|| ParseRuleError::new(s, "amount out of range"))?;
        if amount == 0 {
            return Err(ParseRuleError::new(s, "amount must be at least 1"));
        }
        let unit = unit
            .parse::<TimeUnit>()
            .map_err(|e| ParseRuleError::new(s, e.reason))?;
        Ok(Self { amount, unit })
    }
}

impl TryFrom<String> for Every {
    type Error = ParseRuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Every> for String {
    fn from(rule: Every) -> Self {
        rule.to_string()
    }
}
