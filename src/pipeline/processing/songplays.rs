//! Resolves song-play events against the catalog to build the fact table.
//!
//! Matching is exact and case-sensitive on (`song` == `title`, `artist` ==
//! `artist_name`). Plays without a match are dropped and counted, never raised.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::constants::{NEXT_SONG_PAGE, SURROGATE_COUNTER_BITS};
use crate::domain::{NormalizedEvent, SongRecord, SongplayFact};
use crate::error::{EtlError, Result};

/// The (`song_id`, `artist_id`) pair a play resolves to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongKey {
    pub song_id: String,
    pub artist_id: String,
}

/// Hash index over the catalog keyed by title, then artist name.
///
/// Only rows carrying both a `song_id` and an `artist_id` are indexed, so
/// every match points at a row that also survives into the song and artist
/// dimensions. Duplicate catalog rows collapse to one distinct key.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    by_title: HashMap<String, HashMap<String, Vec<SongKey>>>,
    entries: usize,
}

impl CatalogIndex {
    pub fn build(records: &[SongRecord]) -> Self {
        let mut grouped: HashMap<String, HashMap<String, BTreeSet<SongKey>>> = HashMap::new();
        for record in records {
            let (Some(title), Some(name), Some(song_id), Some(artist_id)) = (
                &record.title,
                &record.artist_name,
                &record.song_id,
                &record.artist_id,
            ) else {
                continue;
            };
            grouped
                .entry(title.clone())
                .or_default()
                .entry(name.clone())
                .or_default()
                .insert(SongKey {
                    song_id: song_id.clone(),
                    artist_id: artist_id.clone(),
                });
        }

        let mut entries = 0;
        let by_title = grouped
            .into_iter()
            .map(|(title, by_artist)| {
                let by_artist = by_artist
                    .into_iter()
                    .map(|(name, keys)| {
                        entries += keys.len();
                        (name, keys.into_iter().collect())
                    })
                    .collect();
                (title, by_artist)
            })
            .collect();

        Self { by_title, entries }
    }

    /// Matching catalog keys in ascending order; empty when unresolved.
    pub fn lookup(&self, title: &str, artist_name: &str) -> &[SongKey] {
        self.by_title
            .get(title)
            .and_then(|by_artist| by_artist.get(artist_name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Partition-local surrogate key source.
///
/// Ids are `(partition << 33) | counter`: unique across partitions without
/// coordination, but with gaps and no relation to event order across partitions.
#[derive(Debug)]
pub struct SurrogateKeyGenerator {
    partition: usize,
    base: i64,
    next: u64,
}

impl SurrogateKeyGenerator {
    const MAX_PARTITIONS: usize = 1 << (63 - SURROGATE_COUNTER_BITS);
    const MAX_COUNTER: u64 = 1 << SURROGATE_COUNTER_BITS;

    pub fn new(partition: usize) -> Result<Self> {
        if partition >= Self::MAX_PARTITIONS {
            return Err(EtlError::SurrogateKeyExhausted { partition });
        }
        Ok(Self {
            partition,
            base: (partition as i64) << SURROGATE_COUNTER_BITS,
            next: 0,
        })
    }

    pub fn next_id(&mut self) -> Result<i64> {
        if self.next >= Self::MAX_COUNTER {
            return Err(EtlError::SurrogateKeyExhausted {
                partition: self.partition,
            });
        }
        let id = self.base | self.next as i64;
        self.next += 1;
        Ok(id)
    }
}

/// Split a songplay id back into (partition, counter).
pub fn decompose_songplay_id(id: i64) -> (usize, u64) {
    let counter_mask = (1i64 << SURROGATE_COUNTER_BITS) - 1;
    (
        (id >> SURROGATE_COUNTER_BITS) as usize,
        (id & counter_mask) as u64,
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Events whose page is a song play
    pub plays_considered: usize,
    /// Plays matched to at least one catalog key
    pub matched_plays: usize,
    /// Plays dropped by the inner join
    pub unresolved_plays: usize,
    /// Plays matched to more than one catalog key
    pub ambiguous_plays: usize,
    pub rows_emitted: usize,
}

impl ResolutionStats {
    pub fn merge(&mut self, other: &ResolutionStats) {
        self.plays_considered += other.plays_considered;
        self.matched_plays += other.matched_plays;
        self.unresolved_plays += other.unresolved_plays;
        self.ambiguous_plays += other.ambiguous_plays;
        self.rows_emitted += other.rows_emitted;
    }
}

pub fn is_song_play(event: &NormalizedEvent) -> bool {
    event
        .page
        .as_deref()
        .is_some_and(|page| page.to_lowercase() == NEXT_SONG_PAGE)
}

pub struct SongplayResolver<'a> {
    index: &'a CatalogIndex,
}

impl<'a> SongplayResolver<'a> {
    pub fn new(index: &'a CatalogIndex) -> Self {
        Self { index }
    }

    /// Resolve one unit of parallel work.
    ///
    /// Row order and ids follow event order inside the partition.
    pub fn resolve_partition(
        &self,
        partition: usize,
        events: &[NormalizedEvent],
    ) -> Result<(Vec<SongplayFact>, ResolutionStats)> {
        let mut keys = SurrogateKeyGenerator::new(partition)?;
        let mut stats = ResolutionStats::default();
        let mut facts = Vec::new();

        for event in events.iter().filter(|e| is_song_play(e)) {
            stats.plays_considered += 1;

            let matches: &[SongKey] = match (&event.song, &event.artist) {
                (Some(song), Some(artist)) => self.index.lookup(song, artist),
                _ => &[],
            };
            if matches.is_empty() {
                stats.unresolved_plays += 1;
                debug!(
                    partition,
                    song = event.song.as_deref().unwrap_or(""),
                    artist = event.artist.as_deref().unwrap_or(""),
                    "Unresolved song play"
                );
                continue;
            }

            stats.matched_plays += 1;
            if matches.len() > 1 {
                stats.ambiguous_plays += 1;
            }
            for key in matches {
                facts.push(SongplayFact {
                    songplay_id: keys.next_id()?,
                    start_time: event.ts,
                    user_id: event.user_id,
                    level: event.level.clone(),
                    song_id: key.song_id.clone(),
                    artist_id: key.artist_id.clone(),
                    session_id: event.session_id,
                    location: event.location.clone(),
                    user_agent: event.user_agent.clone(),
                });
            }
        }

        stats.rows_emitted = facts.len();
        Ok((facts, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn catalog_row(song_id: &str, title: &str, artist_id: &str, name: &str) -> SongRecord {
        SongRecord {
            song_id: Some(song_id.to_string()),
            title: Some(title.to_string()),
            artist_id: Some(artist_id.to_string()),
            artist_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn play(page: &str, song: &str, artist: &str) -> NormalizedEvent {
        NormalizedEvent {
            page: Some(page.to_string()),
            song: Some(song.to_string()),
            artist: Some(artist.to_string()),
            user_id: Some(7),
            level: Some("free".to_string()),
            session_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_page_filter_is_case_insensitive() {
        assert!(is_song_play(&play("NextSong", "a", "b")));
        assert!(is_song_play(&play("NEXTSONG", "a", "b")));
        assert!(!is_song_play(&play("Home", "a", "b")));
        assert!(!is_song_play(&NormalizedEvent::default()));
    }

    #[test]
    fn test_exact_match_join() {
        let index = CatalogIndex::build(&[catalog_row("S1", "Song A", "AR1", "Artist A")]);
        let resolver = SongplayResolver::new(&index);
        let events = vec![
            play("NextSong", "Song A", "Artist A"),
            play("NextSong", "song a", "Artist A"),
            play("NextSong", "Song A", "Artist A "),
            play("Home", "Song A", "Artist A"),
        ];
        let (facts, stats) = resolver.resolve_partition(0, &events).unwrap();

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].song_id, "S1");
        assert_eq!(facts[0].artist_id, "AR1");
        assert_eq!(facts[0].user_id, Some(7));
        assert_eq!(stats.plays_considered, 3);
        assert_eq!(stats.unresolved_plays, 2);
        assert_eq!(stats.matched_plays, 1);
    }

    #[test]
    fn test_null_song_or_artist_never_matches() {
        let index = CatalogIndex::build(&[catalog_row("S1", "Song A", "AR1", "Artist A")]);
        let mut event = play("NextSong", "Song A", "Artist A");
        event.artist = None;
        let (facts, stats) = SongplayResolver::new(&index)
            .resolve_partition(0, &[event])
            .unwrap();
        assert!(facts.is_empty());
        assert_eq!(stats.unresolved_plays, 1);
    }

    #[test]
    fn test_duplicate_catalog_rows_do_not_multiply_plays() {
        let index = CatalogIndex::build(&[
            catalog_row("S1", "Song A", "AR1", "Artist A"),
            catalog_row("S1", "Song A", "AR1", "Artist A"),
        ]);
        assert_eq!(index.len(), 1);
        let (facts, _) = SongplayResolver::new(&index)
            .resolve_partition(0, &[play("NextSong", "Song A", "Artist A")])
            .unwrap();
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_ambiguous_title_yields_row_per_key() {
        let index = CatalogIndex::build(&[
            catalog_row("S2", "Song A", "AR1", "Artist A"),
            catalog_row("S1", "Song A", "AR1", "Artist A"),
        ]);
        let (facts, stats) = SongplayResolver::new(&index)
            .resolve_partition(0, &[play("NextSong", "Song A", "Artist A")])
            .unwrap();
        let ids: Vec<_> = facts.iter().map(|f| f.song_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        assert_eq!(stats.ambiguous_plays, 1);
        assert_eq!(stats.rows_emitted, 2);
    }

    #[test]
    fn test_rows_missing_keys_are_not_indexed() {
        let mut no_artist = catalog_row("S1", "Song A", "AR1", "Artist A");
        no_artist.artist_id = None;
        let index = CatalogIndex::build(&[no_artist]);
        assert!(index.is_empty());
        assert!(index.lookup("Song A", "Artist A").is_empty());
    }

    #[test]
    fn test_surrogate_ids_unique_across_partitions() {
        let index = CatalogIndex::build(&[catalog_row("S1", "Song A", "AR1", "Artist A")]);
        let resolver = SongplayResolver::new(&index);
        let events: Vec<_> = (0..5).map(|_| play("NextSong", "Song A", "Artist A")).collect();

        let mut seen = HashSet::new();
        for partition in [0, 1, 7] {
            let (facts, _) = resolver.resolve_partition(partition, &events).unwrap();
            for fact in facts {
                assert!(seen.insert(fact.songplay_id));
                assert_eq!(decompose_songplay_id(fact.songplay_id).0, partition);
            }
        }
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn test_generator_layout() {
        let mut keys = SurrogateKeyGenerator::new(2).unwrap();
        assert_eq!(keys.next_id().unwrap(), 2 << 33);
        assert_eq!(keys.next_id().unwrap(), (2 << 33) + 1);
        assert_eq!(decompose_songplay_id((2 << 33) + 1), (2, 1));
    }

    #[test]
    fn test_generator_rejects_partition_beyond_key_space() {
        assert!(matches!(
            SurrogateKeyGenerator::new(1 << 30),
            Err(EtlError::SurrogateKeyExhausted { partition }) if partition == 1 << 30
        ));
        assert!(SurrogateKeyGenerator::new((1 << 30) - 1).is_ok());
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ResolutionStats { plays_considered: 2, unresolved_plays: 1, ..Default::default() };
        total.merge(&ResolutionStats { plays_considered: 3, matched_plays: 3, rows_emitted: 4, ..Default::default() });
        assert_eq!(total.plays_considered, 5);
        assert_eq!(total.unresolved_plays, 1);
        assert_eq!(total.rows_emitted, 4);
    }
}
