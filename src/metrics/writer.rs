//! Writer Phase Metrics
//!
//! Table writes and whole-run outcomes.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct WriterMetrics;

/// Histogram fed by the run-level timing guard
pub const RUN_DURATION: &str = phase_metric!(histogram, "writer", "run_duration_seconds");

impl WriterMetrics {
    pub fn record_table_written(rows: usize, files: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "writer", "tables_written")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "writer", "rows_written")).increment(rows as u64);
        ::metrics::counter!(phase_metric!(counter, "writer", "files_written")).increment(files as u64);
        ::metrics::histogram!(phase_metric!(histogram, "writer", "table_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_table_failed() {
        ::metrics::counter!(phase_metric!(counter, "writer", "tables_failed")).increment(1);
    }

    pub fn record_run(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        ::metrics::counter!(phase_metric!(counter, "writer", "runs"), "outcome" => outcome).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "writer", "last_run_timestamp_seconds"))
            .set(chrono::Utc::now().timestamp() as f64);
    }
}

impl PhaseMetrics for WriterMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "writer", "tables_written"));
        let _ = counter!(phase_metric!(counter, "writer", "tables_failed"));
        let _ = counter!(phase_metric!(counter, "writer", "rows_written"));
        let _ = counter!(phase_metric!(counter, "writer", "files_written"));
        let _ = counter!(phase_metric!(counter, "writer", "runs"));
        let _ = histogram!(phase_metric!(histogram, "writer", "table_duration_seconds"));
        let _ = histogram!(RUN_DURATION);
        let _ = gauge!(phase_metric!(gauge, "writer", "last_run_timestamp_seconds"));
    }

    fn phase_name() -> &'static str {
        "writer"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "writer", "tables_written"),
                metric_type: MetricType::Counter,
                help: "Tables written and swapped into place",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "writer", "tables_failed"),
                metric_type: MetricType::Counter,
                help: "Table writes that failed, leaving the previous output",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "writer", "rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows written across all tables",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "writer", "files_written"),
                metric_type: MetricType::Counter,
                help: "Parquet files written",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "writer", "runs"),
                metric_type: MetricType::Counter,
                help: "Completed runs by outcome",
                labels: vec!["outcome"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "writer", "table_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time to write one table",
                labels: vec![],
            },
            MetricDoc {
                name: RUN_DURATION,
                metric_type: MetricType::Histogram,
                help: "Time for a whole run, reads through writes",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "writer", "last_run_timestamp_seconds"),
                metric_type: MetricType::Gauge,
                help: "Unix time the last run finished",
                labels: vec![],
            },
        ]
    }
}
