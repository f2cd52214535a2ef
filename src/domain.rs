//! Row shapes flowing through the pipeline.
//!
//! Raw source rows (`SongRecord`, `EventRecord`) are read once per run and never
//! mutated. Every output row type is rebuilt wholesale from them on each run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One catalog entry, typed against the fixed catalog schema.
///
/// Any field that is missing or carries the wrong JSON type is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub artist_id: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_location: Option<String>,
    pub artist_longitude: Option<f64>,
    pub artist_name: Option<String>,
    pub duration: Option<f64>,
    pub num_songs: Option<i32>,
    pub song_id: Option<String>,
    pub title: Option<String>,
    /// 0 means the release year is unknown
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDim {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistDim {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A raw event-log row: whatever JSON object the log line held.
///
/// No schema is enforced here; fields are typed by the normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    fields: Map<String, Value>,
}

impl EventRecord {
    /// A row whose source line could not be parsed. Every field reads as null.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }
}

impl From<Value> for EventRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::empty(),
        }
    }
}

/// An event row with timestamps resolved, `user_id` cast, and snake_case names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub item_in_session: Option<i64>,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: Option<String>,
    pub registration: Option<NaiveDateTime>,
    pub session_id: Option<i64>,
    pub song: Option<String>,
    pub status: Option<i64>,
    pub ts: Option<NaiveDateTime>,
    pub user_agent: Option<String>,
    pub user_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongplayFact {
    pub songplay_id: i64,
    pub start_time: Option<NaiveDateTime>,
    pub user_id: Option<i32>,
    pub level: Option<String>,
    pub song_id: String,
    pub artist_id: String,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDim {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDim {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    /// ISO week of year
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// 1 = Sunday .. 7 = Saturday
    pub weekday: u32,
}
