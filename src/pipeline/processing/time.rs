//! Calendar attributes for every distinct event timestamp.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::domain::{NormalizedEvent, TimeDim};

/// Pure function of the timestamp.
///
/// `week` is the ISO week number; `weekday` runs 1 = Sunday .. 7 = Saturday.
pub fn time_row(start_time: NaiveDateTime) -> TimeDim {
    TimeDim {
        start_time,
        hour: start_time.hour(),
        day: start_time.day(),
        week: start_time.iso_week().week(),
        month: start_time.month(),
        year: start_time.year(),
        weekday: start_time.weekday().num_days_from_sunday() + 1,
    }
}

/// One row per distinct non-null `ts`, sorted by `start_time`.
pub fn build_time<'e>(events: impl IntoIterator<Item = &'e NormalizedEvent>) -> Vec<TimeDim> {
    events
        .into_iter()
        .filter_map(|e| e.ts)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(time_row)
        .collect()
}
