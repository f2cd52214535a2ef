//! Song and artist dimensions extracted from the catalog.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{ArtistDim, SongDim, SongRecord};
use crate::pipeline::processing::ordering::{f64_nulls_last, nulls_last};

/// Rows that survived extraction plus what was filtered on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<T> {
    /// Sorted by key
    pub rows: Vec<T>,
    pub null_keys_dropped: usize,
    pub duplicates_dropped: usize,
}

pub struct CatalogExtractor<'a> {
    records: &'a [SongRecord],
}

impl<'a> CatalogExtractor<'a> {
    pub fn new(records: &'a [SongRecord]) -> Self {
        Self { records }
    }

    /// One row per non-null `song_id`.
    ///
    /// Duplicates keep the smallest projected row (title, artist_id, year,
    /// duration; nulls last), independent of input order.
    pub fn songs(&self) -> Extraction<SongDim> {
        dedup_by_key(
            self.records.iter().map(|r| {
                let row = r.song_id.clone().map(|song_id| SongDim {
                    song_id,
                    title: r.title.clone(),
                    artist_id: r.artist_id.clone(),
                    year: r.year,
                    duration: r.duration,
                });
                row.map(|s| (s.song_id.clone(), s))
            }),
            compare_songs,
        )
    }

    /// One row per non-null `artist_id`, `artist_name` renamed to `name`.
    ///
    /// Duplicates keep the smallest projected row (name, location, latitude,
    /// longitude; nulls last).
    pub fn artists(&self) -> Extraction<ArtistDim> {
        dedup_by_key(
            self.records.iter().map(|r| {
                let row = r.artist_id.clone().map(|artist_id| ArtistDim {
                    artist_id,
                    name: r.artist_name.clone(),
                    location: r.artist_location.clone(),
                    latitude: r.artist_latitude,
                    longitude: r.artist_longitude,
                });
                row.map(|a| (a.artist_id.clone(), a))
            }),
            compare_artists,
        )
    }
}

/// Reduce-by-key keeping the minimum row under `cmp`. `None` items are null keys.
fn dedup_by_key<T>(
    items: impl Iterator<Item = Option<(String, T)>>,
    cmp: fn(&T, &T) -> Ordering,
) -> Extraction<T> {
    let mut kept: BTreeMap<String, T> = BTreeMap::new();
    let mut null_keys_dropped = 0;
    let mut duplicates_dropped = 0;

    for item in items {
        let Some((key, row)) = item else {
            null_keys_dropped += 1;
            continue;
        };
        match kept.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                duplicates_dropped += 1;
                debug!("Duplicate catalog key {}", slot.key());
                if cmp(&row, slot.get()) == Ordering::Less {
                    slot.insert(row);
                }
            }
        }
    }

    Extraction {
        rows: kept.into_values().collect(),
        null_keys_dropped,
        duplicates_dropped,
    }
}

fn compare_songs(a: &SongDim, b: &SongDim) -> Ordering {
    nulls_last(&a.title, &b.title)
        .then_with(|| nulls_last(&a.artist_id, &b.artist_id))
        .then_with(|| nulls_last(&a.year, &b.year))
        .then_with(|| f64_nulls_last(&a.duration, &b.duration))
}

fn compare_artists(a: &ArtistDim, b: &ArtistDim) -> Ordering {
    nulls_last(&a.name, &b.name)
        .then_with(|| nulls_last(&a.location, &b.location))
        .then_with(|| f64_nulls_last(&a.latitude, &b.latitude))
        .then_with(|| f64_nulls_last(&a.longitude, &b.longitude))
}
