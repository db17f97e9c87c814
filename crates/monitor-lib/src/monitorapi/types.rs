//! Conditions, events, samples and intervals

use super::{Locator, Message};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Severity of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "Info"),
            Level::Warning => write!(f, "Warning"),
            Level::Error => write!(f, "Error"),
        }
    }
}

/// An observation about a subject
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub level: Level,
    pub locator: Locator,
    pub message: Message,
}

impl Condition {
    pub fn new(level: Level, locator: impl Into<Locator>, message: impl Into<Message>) -> Self {
        Self {
            level,
            locator: locator.into(),
            message: message.into(),
        }
    }

    pub fn info(locator: impl Into<Locator>, message: impl Into<Message>) -> Self {
        Self::new(Level::Info, locator, message)
    }

    pub fn warning(locator: impl Into<Locator>, message: impl Into<Message>) -> Self {
        Self::new(Level::Warning, locator, message)
    }

    pub fn error(locator: impl Into<Locator>, message: impl Into<Message>) -> Self {
        Self::new(Level::Error, locator, message)
    }
}

/// A condition observed at a single instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub condition: Condition,
}

impl Event {
    pub fn into_interval(self) -> Interval {
        Interval {
            condition: self.condition,
            from: self.at,
            to: self.at,
        }
    }
}

/// Conditions that were active at one sampling tick
#[derive(Debug, Clone)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub conditions: Vec<Condition>,
}

/// A condition spanning a time range. Instant events have `from == to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(flatten)]
    pub condition: Condition,
    #[serde(with = "crate::serialization::rfc3339")]
    pub from: DateTime<Utc>,
    #[serde(with = "crate::serialization::rfc3339")]
    pub to: DateTime<Utc>,
}

impl Interval {
    pub fn new(condition: Condition, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { condition, from, to }
    }

    pub fn instant(condition: Condition, at: DateTime<Utc>) -> Self {
        Self::new(condition, at, at)
    }

    pub fn level(&self) -> Level {
        self.condition.level
    }

    pub fn locator(&self) -> &Locator {
        &self.condition.locator
    }

    pub fn message(&self) -> &Message {
        &self.condition.message
    }

    pub fn is_instant(&self) -> bool {
        self.from == self.to
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// Ordering used for every interval list the crate hands out
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.from
            .cmp(&other.from)
            .then_with(|| self.to.cmp(&other.to))
            .then_with(|| self.condition.message.cmp(&other.condition.message))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} {} {} {}",
            self.from.format("%b %d %H:%M:%S%.3f"),
            self.to.format("%b %d %H:%M:%S%.3f"),
            self.condition.level,
            self.condition.locator,
            self.condition.message
        )
    }
}

/// Stable sort by from, then to, then message
pub fn sort_intervals(intervals: &mut [Interval]) {
    intervals.sort_by(Interval::chronological_cmp);
}

/// Intervals matching every predicate
pub fn filter_intervals<F>(intervals: &[Interval], predicate: F) -> Vec<Interval>
where
    F: Fn(&Interval) -> bool,
{
    intervals.iter().filter(|i| predicate(i)).cloned().collect()
}

/// Intervals about exactly `locator`
pub fn for_locator(intervals: &[Interval], locator: &Locator) -> Vec<Interval> {
    filter_intervals(intervals, |i| i.locator() == locator)
}

/// One line per interval, used for verdict output
pub fn interval_strings(intervals: &[Interval]) -> Vec<String> {
    intervals.iter().map(ToString::to_string).collect()
}

pub fn is_error(interval: &Interval) -> bool {
    interval.level() == Level::Error
}
