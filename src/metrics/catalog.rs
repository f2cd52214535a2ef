//! Catalog Phase Metrics
//!
//! Catalog files and rows read, and what dimension extraction filtered out.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct CatalogMetrics;

impl CatalogMetrics {
    pub fn record_catalog_read(files: usize, rows: usize, malformed_rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "catalog", "files_read")).increment(files as u64);
        ::metrics::counter!(phase_metric!(counter, "catalog", "rows_read")).increment(rows as u64);
        ::metrics::counter!(phase_metric!(counter, "catalog", "malformed_rows"))
            .increment(malformed_rows as u64);
    }

    /// `table` is either the songs or the artists dimension
    pub fn record_extraction(table: &str, rows: usize, null_keys: usize, duplicates: usize) {
        let table = table.to_string();
        ::metrics::gauge!(phase_metric!(gauge, "catalog", "dimension_rows"), "table" => table.clone())
            .set(rows as f64);
        ::metrics::counter!(phase_metric!(counter, "catalog", "null_keys_dropped"), "table" => table.clone())
            .increment(null_keys as u64);
        ::metrics::counter!(phase_metric!(counter, "catalog", "duplicates_dropped"), "table" => table)
            .increment(duplicates as u64);
    }
}

impl PhaseMetrics for CatalogMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge};

        let _ = counter!(phase_metric!(counter, "catalog", "files_read"));
        let _ = counter!(phase_metric!(counter, "catalog", "rows_read"));
        let _ = counter!(phase_metric!(counter, "catalog", "malformed_rows"));
        let _ = counter!(phase_metric!(counter, "catalog", "null_keys_dropped"));
        let _ = counter!(phase_metric!(counter, "catalog", "duplicates_dropped"));
        let _ = gauge!(phase_metric!(gauge, "catalog", "dimension_rows"));
    }

    fn phase_name() -> &'static str {
        "catalog"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "catalog", "files_read"),
                metric_type: MetricType::Counter,
                help: "Catalog files read",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "rows_read"),
                metric_type: MetricType::Counter,
                help: "Catalog rows read, malformed rows included",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "malformed_rows"),
                metric_type: MetricType::Counter,
                help: "Catalog rows kept with one or more fields nulled",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "null_keys_dropped"),
                metric_type: MetricType::Counter,
                help: "Catalog rows dropped for a null dimension key",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "duplicates_dropped"),
                metric_type: MetricType::Counter,
                help: "Catalog rows collapsed into an existing dimension key",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(gauge, "catalog", "dimension_rows"),
                metric_type: MetricType::Gauge,
                help: "Rows in the last extracted dimension",
                labels: vec!["table"],
            },
        ]
    }
}
