//! Songplay Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::processing::songplays::ResolutionStats;

pub struct SongplayMetrics;

impl SongplayMetrics {
    pub fn record_resolution(stats: &ResolutionStats) {
        ::metrics::counter!(phase_metric!(counter, "songplays", "plays_considered"))
            .increment(stats.plays_considered as u64);
        ::metrics::counter!(phase_metric!(counter, "songplays", "unresolved_plays"))
            .increment(stats.unresolved_plays as u64);
        ::metrics::counter!(phase_metric!(counter, "songplays", "ambiguous_plays"))
            .increment(stats.ambiguous_plays as u64);
        ::metrics::counter!(phase_metric!(counter, "songplays", "rows_emitted"))
            .increment(stats.rows_emitted as u64);
    }
}

impl PhaseMetrics for SongplayMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "songplays", "plays_considered"));
        let _ = counter!(phase_metric!(counter, "songplays", "unresolved_plays"));
        let _ = counter!(phase_metric!(counter, "songplays", "ambiguous_plays"));
        let _ = counter!(phase_metric!(counter, "songplays", "rows_emitted"));
    }

    fn phase_name() -> &'static str {
        "songplays"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "songplays", "plays_considered"),
                metric_type: MetricType::Counter,
                help: "Events whose page marks a song play",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "songplays", "unresolved_plays"),
                metric_type: MetricType::Counter,
                help: "Song plays with no catalog match, dropped by the join",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "songplays", "ambiguous_plays"),
                metric_type: MetricType::Counter,
                help: "Song plays that matched more than one catalog key",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "songplays", "rows_emitted"),
                metric_type: MetricType::Counter,
                help: "Fact rows produced",
                labels: vec![],
            },
        ]
    }
}
