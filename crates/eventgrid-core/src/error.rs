//! Typed errors raised by the calendar engine.
//!
//! Application layers (config, store, commands) stay on `anyhow`; the
//! engine reports the precise failure so callers can tell a bad
//! configuration apart from a failing callback condition.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    /// `week_start` must name a weekday, 0 (Sunday) through 6.
    #[error("invalid week start {0}: expected 0 (Sunday) through 6 (Saturday)")]
    InvalidWeekStart(u32),

    /// The visible-weekday mask must have exactly seven entries.
    #[error("invalid show_days mask: expected 7 entries, got {0}")]
    InvalidShowDays(usize),

    #[error("show_days mask hides every weekday")]
    NoVisibleDays,

    #[error("unknown calendar condition: {0}")]
    UnknownCondition(String),

    #[error("condition `{name}` expects {expected}")]
    ConditionType {
        name: &'static str,
        expected: &'static str,
    },

    #[error("predicate {predicate} belongs to a different calendar")]
    ForeignPredicate { predicate: u64 },

    #[error("invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    /// A callback condition failed while a grid was being built.
    #[error("callback condition of predicate {predicate} failed on {day}")]
    Callback {
        predicate: u64,
        day: NaiveDate,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T, E = CalendarError> = std::result::Result<T, E>;
