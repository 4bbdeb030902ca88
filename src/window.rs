//! Selection of the history a forecast run trains on.
//!
//! The preferred window is the current calendar month up to "now". Early in
//! a month, or right after a fresh deployment, that window is thin, so below
//! a minimum count the whole history is used instead.

use chrono::{Datelike, NaiveDateTime, NaiveTime};

use crate::models::{Reading, TrainingWindowInfo};

// ---

/// Minimum number of in-month readings before the fallback kicks in.
pub const MIN_WINDOW_RECORDS: usize = 100;

/// Midnight on the first day of `now`'s month.
pub fn month_start(now: NaiveDateTime) -> NaiveDateTime {
    // ---
    now.date()
        .with_day(1)
        .unwrap_or_else(|| now.date())
        .and_time(NaiveTime::MIN)
}

/// Readings chosen for training plus the bounds that were applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingWindow {
    pub records: Vec<Reading>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub fallback: bool,
}

impl TrainingWindow {
    /// Keep only the most recent `max` records. `records` is time-ordered.
    pub fn cap(mut self, max: usize) -> Self {
        // ---
        if self.records.len() > max {
            let excess = self.records.len() - max;
            self.records.drain(..excess);
            tracing::debug!("Training set capped to the latest {} records", max);
        }
        self
    }

    pub fn info(&self) -> TrainingWindowInfo {
        TrainingWindowInfo {
            start: self.start,
            end: self.end,
            fallback: self.fallback,
        }
    }
}

/// Pick the training subset from time-ordered `records`.
///
/// Primary window: `[month_start(now), now]`. With fewer than `min_records`
/// readings inside it, every record is used and `fallback` is set; the
/// reported start is then the earlier of the first reading and the month
/// start.
pub fn select(records: &[Reading], now: NaiveDateTime, min_records: usize) -> TrainingWindow {
    // ---
    let start = month_start(now);
    let in_window: Vec<Reading> = records
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= now)
        .cloned()
        .collect();

    if in_window.len() >= min_records {
        return TrainingWindow {
            records: in_window,
            start,
            end: now,
            fallback: false,
        };
    }

    tracing::warn!(
        "Only {} reading(s) since {} (< {}), training on all {} available",
        in_window.len(),
        start,
        min_records,
        records.len()
    );

    TrainingWindow {
        records: records.to_vec(),
        start: records.first().map_or(start, |r| r.timestamp.min(start)),
        end: now,
        fallback: true,
    }
}
