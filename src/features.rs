//! Timestamp → regression feature encoding.
//!
//! The hour of day is projected onto the unit circle so that 23:00 and
//! 00:00 end up next to each other; the weekday is kept as a plain ordinal.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDateTime, Timelike};

// ---

/// Column names, in the order [`FeatureVector::to_array`] emits them.
pub const FEATURE_NAMES: [&str; FeatureVector::LEN] = ["sin_hour", "cos_hour", "day_of_week"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    // ---
    pub sin_hour: f64,
    pub cos_hour: f64,
    /// Monday = 0 … Sunday = 6.
    pub day_of_week: u32,
}

impl FeatureVector {
    pub const LEN: usize = 3;

    /// Encode a timestamp. Minutes and seconds are ignored.
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        // ---
        let angle = 2.0 * PI * timestamp.hour() as f64 / 24.0;

        FeatureVector {
            sin_hour: angle.sin(),
            cos_hour: angle.cos(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
        }
    }

    pub fn to_array(&self) -> [f64; Self::LEN] {
        [self.sin_hour, self.cos_hour, self.day_of_week as f64]
    }
}

/// Feature names as owned strings, for artifact metadata.
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|name| name.to_string()).collect()
}
