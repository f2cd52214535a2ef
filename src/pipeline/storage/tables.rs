//! Column layouts and partitioning of the five output tables.

use super::{Cell, ColumnDef, Table};
use crate::constants::{ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE};
use crate::domain::{ArtistDim, SongDim, SongplayFact, TimeDim, UserDim};

use super::ColumnType::{Float64, Int32, Int64, Timestamp, Utf8};

impl Table for SongDim {
    const NAME: &'static str = SONGS_TABLE;
    const PARTITION_BY: &'static [&'static str] = &["year", "artist_id"];

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::required("song_id", Utf8),
            ColumnDef::optional("title", Utf8),
            ColumnDef::optional("artist_id", Utf8),
            ColumnDef::optional("year", Int32),
            ColumnDef::optional("duration", Float64),
        ];
        COLUMNS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Utf8(Some(self.song_id.clone())),
            Cell::Utf8(self.title.clone()),
            Cell::Utf8(self.artist_id.clone()),
            Cell::Int32(self.year),
            Cell::Float64(self.duration),
        ]
    }
}

impl Table for ArtistDim {
    const NAME: &'static str = ARTISTS_TABLE;
    const PARTITION_BY: &'static [&'static str] = &[];

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::required("artist_id", Utf8),
            ColumnDef::optional("name", Utf8),
            ColumnDef::optional("location", Utf8),
            ColumnDef::optional("latitude", Float64),
            ColumnDef::optional("longitude", Float64),
        ];
        COLUMNS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Utf8(Some(self.artist_id.clone())),
            Cell::Utf8(self.name.clone()),
            Cell::Utf8(self.location.clone()),
            Cell::Float64(self.latitude),
            Cell::Float64(self.longitude),
        ]
    }
}

impl Table for SongplayFact {
    const NAME: &'static str = SONGPLAYS_TABLE;
    const PARTITION_BY: &'static [&'static str] = &[];

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::required("songplay_id", Int64),
            ColumnDef::optional("start_time", Timestamp),
            ColumnDef::optional("user_id", Int32),
            ColumnDef::optional("level", Utf8),
            ColumnDef::required("song_id", Utf8),
            ColumnDef::required("artist_id", Utf8),
            ColumnDef::optional("session_id", Int64),
            ColumnDef::optional("location", Utf8),
            ColumnDef::optional("user_agent", Utf8),
        ];
        COLUMNS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int64(Some(self.songplay_id)),
            Cell::Timestamp(self.start_time),
            Cell::Int32(self.user_id),
            Cell::Utf8(self.level.clone()),
            Cell::Utf8(Some(self.song_id.clone())),
            Cell::Utf8(Some(self.artist_id.clone())),
            Cell::Int64(self.session_id),
            Cell::Utf8(self.location.clone()),
            Cell::Utf8(self.user_agent.clone()),
        ]
    }
}

impl Table for UserDim {
    const NAME: &'static str = USERS_TABLE;
    const PARTITION_BY: &'static [&'static str] = &["gender", "level"];

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::required("user_id", Int32),
            ColumnDef::optional("first_name", Utf8),
            ColumnDef::optional("last_name", Utf8),
            ColumnDef::optional("gender", Utf8),
            ColumnDef::optional("level", Utf8),
        ];
        COLUMNS
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int32(Some(self.user_id)),
            Cell::Utf8(self.first_name.clone()),
            Cell::Utf8(self.last_name.clone()),
            Cell::Utf8(self.gender.clone()),
            Cell::Utf8(self.level.clone()),
        ]
    }
}

impl Table for TimeDim {
    const NAME: &'static str = TIME_TABLE;
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::required("start_time", Timestamp),
            ColumnDef::required("hour", Int32),
            ColumnDef::required("day", Int32),
            ColumnDef::required("week", Int32),
            ColumnDef::required("month", Int32),
            ColumnDef::required("year", Int32),
            ColumnDef::required("weekday", Int32),
        ];
        COLUMNS
    }

    fn cells(&self) -> Vec<Cell> {
        // Calendar parts are small; the casts cannot truncate
        vec![
            Cell::Timestamp(Some(self.start_time)),
            Cell::Int32(Some(self.hour as i32)),
            Cell::Int32(Some(self.day as i32)),
            Cell::Int32(Some(self.week as i32)),
            Cell::Int32(Some(self.month as i32)),
            Cell::Int32(Some(self.year)),
            Cell::Int32(Some(self.weekday as i32)),
        ]
    }
}
