//! Event Phase Metrics
//!
//! Event-log volume, failed casts during normalization, and the user and
//! time dimensions derived from the events.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct EventMetrics;

impl EventMetrics {
    pub fn record_partition(rows: usize, unparseable_lines: usize, malformed_lines: usize) {
        ::metrics::counter!(phase_metric!(counter, "events", "partitions_processed")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "events", "rows_per_partition"))
            .record(rows as f64);
        ::metrics::counter!(phase_metric!(counter, "events", "unparseable_lines"))
            .increment(unparseable_lines as u64);
        ::metrics::counter!(phase_metric!(counter, "events", "malformed_lines"))
            .increment(malformed_lines as u64);
    }

    pub fn record_normalization(
        rows: usize,
        ts_failures: usize,
        registration_failures: usize,
        user_id_failures: usize,
    ) {
        ::metrics::counter!(phase_metric!(counter, "events", "rows_normalized")).increment(rows as u64);
        ::metrics::counter!(phase_metric!(counter, "events", "cast_failures"), "field" => "ts")
            .increment(ts_failures as u64);
        ::metrics::counter!(phase_metric!(counter, "events", "cast_failures"), "field" => "registration")
            .increment(registration_failures as u64);
        ::metrics::counter!(phase_metric!(counter, "events", "cast_failures"), "field" => "user_id")
            .increment(user_id_failures as u64);
    }

    pub fn record_dimensions(users: usize, tied_users: usize, time_rows: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "events", "users")).set(users as f64);
        ::metrics::counter!(phase_metric!(counter, "events", "tied_users")).increment(tied_users as u64);
        ::metrics::gauge!(phase_metric!(gauge, "events", "time_rows")).set(time_rows as f64);
    }
}

impl PhaseMetrics for EventMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "events", "partitions_processed"));
        let _ = counter!(phase_metric!(counter, "events", "unparseable_lines"));
        let _ = counter!(phase_metric!(counter, "events", "malformed_lines"));
        let _ = counter!(phase_metric!(counter, "events", "rows_normalized"));
        let _ = counter!(phase_metric!(counter, "events", "cast_failures"));
        let _ = counter!(phase_metric!(counter, "events", "tied_users"));
        let _ = histogram!(phase_metric!(histogram, "events", "rows_per_partition"));
        let _ = gauge!(phase_metric!(gauge, "events", "users"));
        let _ = gauge!(phase_metric!(gauge, "events", "time_rows"));
    }

    fn phase_name() -> &'static str {
        "events"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "events", "partitions_processed"),
                metric_type: MetricType::Counter,
                help: "Event-log partitions normalized and resolved",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "events", "unparseable_lines"),
                metric_type: MetricType::Counter,
                help: "Event lines that were not valid JSON",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "events", "malformed_lines"),
                metric_type: MetricType::Counter,
                help: "Event lines that did not hold a JSON object",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "events", "rows_normalized"),
                metric_type: MetricType::Counter,
                help: "Event rows normalized",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "events", "cast_failures"),
                metric_type: MetricType::Counter,
                help: "Present event values that failed conversion and became null",
                labels: vec!["field"],
            },
            MetricDoc {
                name: phase_metric!(counter, "events", "tied_users"),
                metric_type: MetricType::Counter,
                help: "Users with conflicting rows at their latest timestamp",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "events", "rows_per_partition"),
                metric_type: MetricType::Histogram,
                help: "Event rows in each partition",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "events", "users"),
                metric_type: MetricType::Gauge,
                help: "Rows in the last built user dimension",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "events", "time_rows"),
                metric_type: MetricType::Gauge,
                help: "Rows in the last built time dimension",
                labels: vec![],
            },
        ]
    }
}
