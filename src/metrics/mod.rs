//! Metrics for the ETL run
//!
//! Each pipeline phase defines its own metrics in a dedicated submodule so
//! names stay unique and ownership is clear.

pub mod catalog;
pub mod core;
pub mod events;
pub mod registry;
pub mod songplays;
pub mod writer;

pub use catalog::CatalogMetrics;
pub use events::EventMetrics;
pub use songplays::SongplayMetrics;
pub use writer::WriterMetrics;

use std::net::SocketAddr;
use std::sync::Once;

use tracing::{info, warn};

use crate::pipeline::RunReport;

static INIT: Once = Once::new();

/// Initialize the global metrics recorder
///
/// Idempotent. The Prometheus HTTP listener is only started when
/// `listen_addr` is set; otherwise the recorder is installed without one.
pub fn init_metrics(listen_addr: Option<&str>) {
    INIT.call_once(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

        let addr = listen_addr.and_then(|raw| match raw.parse::<SocketAddr>() {
            Ok(addr) => Some(addr),
            Err(e) => {
                warn!("Invalid metrics listen address '{}': {}", raw, e);
                None
            }
        });

        let installed = match addr {
            Some(addr) => builder.with_http_listener(addr).install().map(|_| {
                info!("Prometheus HTTP exporter started at http://{}/metrics", addr);
            }),
            None => builder.install_recorder().map(|_| ()),
        };

        match installed {
            Ok(()) => {
                registry::register_all_metrics();
                info!("All pipeline metrics registered successfully");
            }
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    });
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register every metric of the phase so it shows up before first use
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Histogram => "histogram",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Metric names follow etl_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

/// Prometheus text exposition of a finished run.
pub fn format_run_summary(report: &RunReport) -> String {
    let mut text = format!(
        "# HELP etl_run_timestamp_ms Last run timestamp in milliseconds\n\
         # TYPE etl_run_timestamp_ms gauge\n\
         etl_run_timestamp_ms {}\n\
         # HELP etl_run_success Whether every table of the last run was written\n\
         # TYPE etl_run_success gauge\n\
         etl_run_success {}\n\
         # HELP etl_run_duration_seconds Duration of the last run\n\
         # TYPE etl_run_duration_seconds gauge\n\
         etl_run_duration_seconds {}\n\
         # HELP etl_run_unresolved_plays Song plays dropped by the catalog join\n\
         # TYPE etl_run_unresolved_plays gauge\n\
         etl_run_unresolved_plays {}\n\
         # HELP etl_run_table_rows Rows written per table\n\
         # TYPE etl_run_table_rows gauge\n",
        report.finished_at.timestamp_millis(),
        if report.succeeded() { 1 } else { 0 },
        report.duration_secs,
        report
            .log_stats
            .map(|s| s.resolution.unresolved_plays)
            .unwrap_or(0),
    );
    for table in &report.tables {
        text.push_str(&format!(
            "etl_run_table_rows{{table=\"{}\"}} {}\n",
            table.table, table.rows
        ));
    }
    text
}

/// Push the run summary to a Prometheus Pushgateway.
///
/// Failures are logged and never fail the run.
pub async fn push_run_summary(base_url: &str, report: &RunReport) {
    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        base_url.trim_end_matches('/'),
        "songplay_etl",
        report.run_id
    );
    let body = format_run_summary(report);

    info!("pushgateway: pushing {} bytes to {}", body.len(), push_url);
    let client = reqwest::Client::new();
    match client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => {
            info!("pushgateway: pushed run summary for run={}", report.run_id);
        }
        Ok(r) => {
            warn!("pushgateway: push failed with status={}", r.status().as_u16());
        }
        Err(e) => {
            warn!("pushgateway: push request failed: {}", e);
        }
    }
}
