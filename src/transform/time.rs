//! Time table
//!
//! Event timestamps are epoch milliseconds truncated to whole seconds and
//! interpreted in UTC. `week` is the ISO-8601 week number; `weekday` follows
//! the configured [`WeekdayConvention`].

use super::Derivation;
use crate::types::{LogRecord, TimeRow, WeekdayConvention};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashSet;

/// Convert epoch milliseconds to a whole-second UTC timestamp
pub fn start_time_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(millis.div_euclid(1000), 0)
}

/// Weekday number of a timestamp under the given convention
pub fn weekday_number(ts: &DateTime<Utc>, convention: WeekdayConvention) -> u32 {
    match convention {
        WeekdayConvention::SundayFirst => ts.weekday().number_from_sunday(),
        WeekdayConvention::Iso => ts.weekday().number_from_monday(),
    }
}

/// Decompose a timestamp into a time table row
pub fn time_row(start_time: DateTime<Utc>, convention: WeekdayConvention) -> TimeRow {
    TimeRow {
        start_time,
        hour: start_time.hour(),
        day: start_time.day(),
        week: start_time.iso_week().week(),
        month: start_time.month(),
        year: start_time.year(),
        weekday: weekday_number(&start_time, convention),
    }
}

/// One row per distinct event timestamp among playback events
pub fn derive_time(logs: &[LogRecord], convention: WeekdayConvention) -> Derivation<TimeRow> {
    let mut seen = HashSet::new();
    let mut derivation = Derivation::new(Vec::new());

    for record in logs.iter().filter(|r| r.is_playback()) {
        let Some(raw) = &record.ts else {
            continue;
        };

        let start_time = match raw.epoch_millis() {
            Ok(ms) => start_time_from_millis(ms),
            Err(message) => {
                tracing::debug!(%message, "Skipping event with malformed ts");
                None
            }
        };

        match start_time {
            Some(start_time) => {
                if seen.insert(start_time) {
                    derivation.rows.push(time_row(start_time, convention));
                }
            }
            None => derivation.skipped += 1,
        }
    }

    derivation
}
