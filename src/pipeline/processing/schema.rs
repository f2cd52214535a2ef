//! Fixed column contract for the song catalog source.
//!
//! The catalog is read against this schema only. A field that is absent, null,
//! or of the wrong JSON type is read as null; the record itself is never rejected.
//! The event-log source has no registered schema and is typed by the normalizer.

use serde_json::Value;

use crate::domain::SongRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Utf8,
    Int32,
    Float64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn field(name: &'static str, field_type: FieldType) -> FieldDef {
    FieldDef { name, field_type }
}

pub const SONG_CATALOG_SCHEMA: [FieldDef; 10] = [
    field("artist_id", FieldType::Utf8),
    field("artist_latitude", FieldType::Float64),
    field("artist_location", FieldType::Utf8),
    field("artist_longitude", FieldType::Float64),
    field("artist_name", FieldType::Utf8),
    field("duration", FieldType::Float64),
    field("num_songs", FieldType::Int32),
    field("song_id", FieldType::Utf8),
    field("title", FieldType::Utf8),
    field("year", FieldType::Int32),
];

/// Read a string column. Numbers and booleans keep their JSON text.
pub fn read_utf8(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read an integer column. Only integral JSON numbers that fit in 32 bits qualify.
pub fn read_int32(value: Option<&Value>) -> Option<i32> {
    value?.as_i64().and_then(|n| i32::try_from(n).ok())
}

/// Read a floating-point column from any finite JSON number.
pub fn read_float64(value: Option<&Value>) -> Option<f64> {
    value?.as_f64().filter(|f| f.is_finite())
}

/// Type one catalog JSON value against [`SONG_CATALOG_SCHEMA`].
///
/// Non-object values produce a record with every field null.
pub fn parse_song_record(value: &Value) -> SongRecord {
    let get = |name: &str| value.get(name);
    SongRecord {
        artist_id: read_utf8(get("artist_id")),
        artist_latitude: read_float64(get("artist_latitude")),
        artist_location: read_utf8(get("artist_location")),
        artist_longitude: read_float64(get("artist_longitude")),
        artist_name: read_utf8(get("artist_name")),
        duration: read_float64(get("duration")),
        num_songs: read_int32(get("num_songs")),
        song_id: read_utf8(get("song_id")),
        title: read_utf8(get("title")),
        year: read_int32(get("year")),
    }
}

/// Count registered fields that are present and non-null but could not be typed.
///
/// Used to report malformed catalog rows without failing them.
pub fn mistyped_field_count(value: &Value) -> usize {
    SONG_CATALOG_SCHEMA
        .iter()
        .filter(|f| {
            let raw = value.get(f.name).filter(|v| !v.is_null());
            raw.is_some()
                && match f.field_type {
                    FieldType::Utf8 => read_utf8(raw).is_none(),
                    FieldType::Int32 => read_int32(raw).is_none(),
                    FieldType::Float64 => read_float64(raw).is_none(),
                }
        })
        .count()
}

/// A catalog value is malformed when it is not an object or any field is mistyped.
pub fn is_malformed_catalog_value(value: &Value) -> bool {
    !value.is_object() || mistyped_field_count(value) > 0
}
