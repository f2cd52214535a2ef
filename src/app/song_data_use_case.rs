use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::app::ports::SourceReaderPort;
use crate::domain::{ArtistDim, SongDim, SongRecord};
use crate::error::Result;
use crate::metrics::catalog::CatalogMetrics;
use crate::pipeline::processing::catalog::{CatalogExtractor, Extraction};
use crate::pipeline::processing::schema::{is_malformed_catalog_value, parse_song_record};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub files: usize,
    pub rows: usize,
    /// Rows that were unparseable or had at least one mistyped field
    pub malformed_rows: usize,
}

/// The typed catalog as read for one run.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub records: Vec<SongRecord>,
    pub stats: CatalogStats,
}

#[derive(Debug, Clone)]
pub struct SongTables {
    pub songs: Extraction<SongDim>,
    pub artists: Extraction<ArtistDim>,
}

/// Use case for reading the song catalog and building the song and artist dimensions
pub struct SongDataUseCase {
    source: Arc<dyn SourceReaderPort>,
}

impl SongDataUseCase {
    pub fn new(source: Arc<dyn SourceReaderPort>) -> Self {
        Self { source }
    }

    /// Read every catalog file and type it against the catalog schema.
    pub async fn load_catalog(&self) -> Result<CatalogSnapshot> {
        let batches = self.source.read_catalog().await?;
        let mut stats = CatalogStats {
            files: batches.len(),
            ..Default::default()
        };

        let mut records = Vec::new();
        for batch in &batches {
            for value in &batch.values {
                if is_malformed_catalog_value(value) {
                    stats.malformed_rows += 1;
                }
                records.push(parse_song_record(value));
            }
        }
        stats.rows = records.len();

        if stats.malformed_rows > 0 {
            warn!(
                malformed_rows = stats.malformed_rows,
                "Catalog rows with unreadable values were kept with null fields"
            );
        }
        info!(files = stats.files, rows = stats.rows, "Catalog loaded");
        CatalogMetrics::record_catalog_read(stats.files, stats.rows, stats.malformed_rows);

        Ok(CatalogSnapshot { records, stats })
    }

    /// Build both catalog dimensions from an already loaded catalog.
    pub fn extract(&self, catalog: &CatalogSnapshot) -> SongTables {
        let extractor = CatalogExtractor::new(&catalog.records);
        let songs = extractor.songs();
        let artists = extractor.artists();

        for (table, rows, nulls, dups) in [
            ("songs", songs.rows.len(), songs.null_keys_dropped, songs.duplicates_dropped),
            ("artists", artists.rows.len(), artists.null_keys_dropped, artists.duplicates_dropped),
        ] {
            info!(
                table,
                rows,
                null_keys_dropped = nulls,
                duplicates_dropped = dups,
                "Dimension extracted"
            );
            CatalogMetrics::record_extraction(table, rows, nulls, dups);
        }

        SongTables { songs, artists }
    }

    pub async fn build(&self) -> Result<SongTables> {
        let catalog = self.load_catalog().await?;
        Ok(self.extract(&catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::RawBatch;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct MockSource {
        catalog: Vec<RawBatch>,
    }

    #[async_trait]
    impl SourceReaderPort for MockSource {
        async fn read_catalog(&self) -> Result<Vec<RawBatch>> {
            Ok(self.catalog.clone())
        }

        async fn read_event_partitions(&self) -> Result<Vec<RawBatch>> {
            Ok(Vec::new())
        }
    }

    fn batch(values: Vec<Value>) -> RawBatch {
        RawBatch {
            source: "song_data/A/A/A/TRAAAAW128F429D538.json".to_string(),
            values,
            unparseable: 0,
        }
    }

    #[tokio::test]
    async fn test_build_song_and_artist_tables() {
        let source = MockSource {
            catalog: vec![
                batch(vec![json!({
                    "song_id": "S1", "title": "Song A", "artist_id": "AR1",
                    "artist_name": "Band", "year": 2001, "duration": 200.5
                })]),
                batch(vec![
                    json!({"song_id": "S2", "title": "Song B", "artist_id": "AR1", "artist_name": "Band"}),
                    json!({"song_id": null, "artist_id": null, "title": "orphan"}),
                ]),
            ],
        };
        let use_case = SongDataUseCase::new(Arc::new(source));
        let tables = use_case.build().await.unwrap();

        let song_ids: Vec<_> = tables.songs.rows.iter().map(|s| s.song_id.as_str()).collect();
        assert_eq!(song_ids, vec!["S1", "S2"]);
        assert_eq!(tables.songs.null_keys_dropped, 1);
        assert_eq!(tables.artists.rows.len(), 1);
        assert_eq!(tables.artists.rows[0].name.as_deref(), Some("Band"));
        assert_eq!(tables.artists.duplicates_dropped, 1);
        assert_eq!(tables.artists.null_keys_dropped, 1);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_counted_not_dropped() {
        let source = MockSource {
            catalog: vec![batch(vec![
                Value::Null,
                json!({"song_id": "S1", "year": "unknown"}),
                json!({"song_id": "S2", "year": 1999}),
            ])],
        };
        let use_case = SongDataUseCase::new(Arc::new(source));
        let catalog = use_case.load_catalog().await.unwrap();

        assert_eq!(catalog.stats.files, 1);
        assert_eq!(catalog.stats.rows, 3);
        assert_eq!(catalog.stats.malformed_rows, 2);
        assert_eq!(catalog.records[1].song_id.as_deref(), Some("S1"));
        assert_eq!(catalog.records[1].year, None);

        let tables = use_case.extract(&catalog);
        assert_eq!(tables.songs.rows.len(), 2);
    }
}
