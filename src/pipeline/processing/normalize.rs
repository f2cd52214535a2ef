//! Cleans and retypes raw event-log rows.
//!
//! Normalization never drops a row: each input record yields exactly one
//! `NormalizedEvent`. Values that fail conversion become null and are counted.

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{EventRecord, NormalizedEvent};
use crate::pipeline::processing::schema::{read_float64, read_utf8};

/// Conversion failures seen while normalizing a batch.
///
/// A failure is a present, non-null source value that could not be converted.
/// Missing or null source values are not failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub rows: usize,
    pub ts_cast_failures: usize,
    pub registration_cast_failures: usize,
    pub user_id_cast_failures: usize,
}

impl NormalizationStats {
    pub fn merge(&mut self, other: &NormalizationStats) {
        self.rows += other.rows;
        self.ts_cast_failures += other.ts_cast_failures;
        self.registration_cast_failures += other.registration_cast_failures;
        self.user_id_cast_failures += other.user_id_cast_failures;
    }
}

/// An event line is malformed when it did not hold a JSON object.
///
/// Such a line still yields one all-null row.
pub fn is_malformed_event_value(value: &Value) -> bool {
    !value.is_object()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, record: &EventRecord) -> NormalizedEvent {
        NormalizedEvent {
            artist: read_utf8(record.get("artist")),
            auth: read_utf8(record.get("auth")),
            first_name: read_utf8(record.get("firstName")),
            gender: read_utf8(record.get("gender")),
            item_in_session: cast_int64(record.get("itemInSession")),
            last_name: read_utf8(record.get("lastName")),
            length: read_float64(record.get("length")),
            level: read_utf8(record.get("level")),
            location: read_utf8(record.get("location")),
            method: read_utf8(record.get("method")),
            page: read_utf8(record.get("page")),
            registration: cast_epoch_millis(record.get("registration")),
            session_id: cast_int64(record.get("sessionId")),
            song: read_utf8(record.get("song")),
            status: cast_int64(record.get("status")),
            ts: cast_epoch_millis(record.get("ts")),
            user_agent: read_utf8(record.get("userAgent")),
            user_id: cast_user_id(record.get("userId")),
        }
    }

    /// Normalize one unit of work, tallying failed casts.
    pub fn normalize_partition(
        &self,
        records: &[EventRecord],
    ) -> (Vec<NormalizedEvent>, NormalizationStats) {
        let mut stats = NormalizationStats {
            rows: records.len(),
            ..Default::default()
        };
        let events = records
            .iter()
            .map(|record| {
                let event = self.normalize(record);
                if event.ts.is_none() && record.get("ts").is_some() {
                    stats.ts_cast_failures += 1;
                }
                if event.registration.is_none() && record.get("registration").is_some() {
                    stats.registration_cast_failures += 1;
                }
                if event.user_id.is_none() && record.get("userId").is_some() {
                    stats.user_id_cast_failures += 1;
                }
                event
            })
            .collect();
        (events, stats)
    }
}

/// Read a number or numeric string as f64. Blank and non-numeric text is `None`.
fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

/// Epoch milliseconds to a UTC timestamp with microsecond precision.
pub fn cast_epoch_millis(value: Option<&Value>) -> Option<NaiveDateTime> {
    epoch_millis_to_timestamp(numeric(value)?)
}

pub fn epoch_millis_to_timestamp(millis: f64) -> Option<NaiveDateTime> {
    let micros = (millis * 1000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    let micros = micros as i64;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

/// Integer cast: integral text parses directly, decimal values truncate toward zero.
fn cast_int64(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Value::String(s) = value {
        if let Ok(n) = s.trim().parse::<i64>() {
            return Some(n);
        }
    }
    let f = numeric(Some(value))?.trunc();
    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn cast_user_id(value: Option<&Value>) -> Option<i32> {
    cast_int64(value).and_then(|n| i32::try_from(n).ok())
}
