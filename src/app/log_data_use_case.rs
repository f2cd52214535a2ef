use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::app::ports::SourceReaderPort;
use crate::app::song_data_use_case::CatalogSnapshot;
use crate::domain::{EventRecord, NormalizedEvent, SongplayFact, TimeDim, UserDim};
use crate::error::Result;
use crate::metrics::events::EventMetrics;
use crate::metrics::songplays::SongplayMetrics;
use crate::pipeline::processing::normalize::{
    is_malformed_event_value, EventNormalizer, NormalizationStats,
};
use crate::pipeline::processing::songplays::{CatalogIndex, ResolutionStats, SongplayResolver};
use crate::pipeline::processing::time::build_time;
use crate::pipeline::processing::users::{UserBuildStats, UserDimensionBuilder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub partitions: usize,
    pub unparseable_lines: usize,
    /// Lines that did not hold a JSON object, unparseable ones included
    pub malformed_lines: usize,
    pub normalization: NormalizationStats,
    pub resolution: ResolutionStats,
    pub users_without_id: usize,
    pub tied_users: usize,
}

#[derive(Debug, Clone)]
pub struct LogTables {
    /// Sorted by `songplay_id`
    pub songplays: Vec<SongplayFact>,
    pub users: Vec<UserDim>,
    pub time: Vec<TimeDim>,
    pub stats: LogStats,
}

/// What one worker produced for one event-log partition.
struct PartitionOutput {
    partition: usize,
    unparseable: usize,
    malformed: usize,
    events: Vec<NormalizedEvent>,
    songplays: Vec<SongplayFact>,
    normalization: NormalizationStats,
    resolution: ResolutionStats,
}

/// Use case for turning the event logs into the songplays, users and time tables
pub struct LogDataUseCase {
    source: Arc<dyn SourceReaderPort>,
}

impl LogDataUseCase {
    pub fn new(source: Arc<dyn SourceReaderPort>) -> Self {
        Self { source }
    }

    /// Normalize and resolve every partition in parallel, then fold the
    /// results into the three log-derived tables.
    ///
    /// Partitions are merged in partition order, so output does not depend
    /// on which worker finishes first.
    pub async fn build(&self, catalog: &CatalogSnapshot) -> Result<LogTables> {
        let index = Arc::new(CatalogIndex::build(&catalog.records));
        info!(entries = index.len(), "Catalog index built");

        let batches = self.source.read_event_partitions().await?;
        let partitions = batches.len();

        let mut tasks = JoinSet::new();
        for (partition, batch) in batches.into_iter().enumerate() {
            let index = Arc::clone(&index);
            tasks.spawn_blocking(move || -> Result<PartitionOutput> {
                let malformed = batch.values.iter().filter(|v| is_malformed_event_value(v)).count();
                let records: Vec<EventRecord> =
                    batch.values.into_iter().map(EventRecord::from).collect();
                let (events, normalization) = EventNormalizer::new().normalize_partition(&records);
                let (songplays, resolution) =
                    SongplayResolver::new(&index).resolve_partition(partition, &events)?;
                debug!(
                    partition,
                    source = %batch.source,
                    rows = events.len(),
                    songplays = songplays.len(),
                    "Partition processed"
                );
                Ok(PartitionOutput {
                    partition,
                    unparseable: batch.unparseable,
                    malformed,
                    events,
                    songplays,
                    normalization,
                    resolution,
                })
            });
        }

        let mut outputs = Vec::with_capacity(partitions);
        while let Some(joined) = tasks.join_next().await {
            outputs.push(joined??);
        }
        outputs.sort_by_key(|o| o.partition);

        let mut stats = LogStats {
            partitions,
            ..Default::default()
        };
        let mut normalization = NormalizationStats::default();
        let mut users = UserDimensionBuilder::new();
        let mut songplays = Vec::new();

        for output in &mut outputs {
            stats.unparseable_lines += output.unparseable;
            stats.malformed_lines += output.malformed;
            normalization.merge(&output.normalization);
            stats.resolution.merge(&output.resolution);
            users.accumulate(&output.events);
            songplays.append(&mut output.songplays);
            EventMetrics::record_partition(output.events.len(), output.unparseable, output.malformed);
        }
        stats.normalization = normalization;

        let (users, user_stats) = users.finish();
        stats.users_without_id = user_stats.events_without_user;
        stats.tied_users = user_stats.tied_users;

        let time = build_time(outputs.iter().flat_map(|o| o.events.iter()));

        self.report(&stats, &user_stats, users.len(), time.len());

        Ok(LogTables {
            songplays,
            users,
            time,
            stats,
        })
    }

    fn report(&self, stats: &LogStats, user_stats: &UserBuildStats, users: usize, time_rows: usize) {
        let n = &stats.normalization;
        if stats.malformed_lines > 0 {
            warn!(
                lines = stats.malformed_lines,
                unparseable = stats.unparseable_lines,
                "Malformed event lines were kept as empty rows"
            );
        }
        if n.ts_cast_failures + n.registration_cast_failures + n.user_id_cast_failures > 0 {
            warn!(
                ts = n.ts_cast_failures,
                registration = n.registration_cast_failures,
                user_id = n.user_id_cast_failures,
                "Event values failed conversion and were set to null"
            );
        }
        if user_stats.tied_users > 0 {
            warn!(
                tied_users = user_stats.tied_users,
                "Users with conflicting rows at their latest timestamp"
            );
        }

        let r = &stats.resolution;
        info!(
            partitions = stats.partitions,
            events = n.rows,
            plays = r.plays_considered,
            songplays = r.rows_emitted,
            unresolved = r.unresolved_plays,
            ambiguous = r.ambiguous_plays,
            users,
            time_rows,
            "Event logs processed"
        );

        EventMetrics::record_normalization(
            n.rows,
            n.ts_cast_failures,
            n.registration_cast_failures,
            n.user_id_cast_failures,
        );
        EventMetrics::record_dimensions(users, user_stats.tied_users, time_rows);
        SongplayMetrics::record_resolution(r);
    }
}
