//! Registration of every phase's metrics, with name-conflict detection.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::metrics::{MetricDoc, PhaseMetrics};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::catalog::CatalogMetrics>(&mut all_metrics);
    register_phase_metrics::<super::events::EventMetrics>(&mut all_metrics);
    register_phase_metrics::<super::songplays::SongplayMetrics>(&mut all_metrics);
    register_phase_metrics::<super::writer::WriterMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );

    if std::env::var("ETL_METRICS_DEBUG").is_ok() {
        log_metrics_summary(&all_metrics);
    }
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, (String, MetricDoc)>) {
    T::register_metrics();
    let phase_docs = T::metrics_documentation();
    let phase_name = T::phase_name();

    info!(
        "Registering {} metrics for phase '{}'",
        phase_docs.len(),
        phase_name
    );

    for doc in phase_docs {
        if let Some((owner, _)) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined in both '{}' and '{}'",
                doc.name, owner, phase_name
            );
        } else {
            all_metrics.insert(doc.name.to_string(), (phase_name.to_string(), doc));
        }
    }
}

fn log_metrics_summary(all_metrics: &HashMap<String, (String, MetricDoc)>) {
    let mut by_phase: HashMap<&str, Vec<&MetricDoc>> = HashMap::new();
    for doc in all_metrics.values().map(|(_, doc)| doc) {
        by_phase
            .entry(extract_phase_from_metric_name(doc.name))
            .or_default()
            .push(doc);
    }

    for (phase, metrics) in by_phase {
        info!("Phase '{}': {} metrics", phase, metrics.len());
        for metric in metrics {
            info!(
                "  - {} ({}): {}",
                metric.name,
                metric.metric_type.as_str(),
                metric.help
            );
        }
    }
}

/// "etl_catalog_rows_read_total" -> "catalog"
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("etl_")
        .and_then(|rest| rest.split('_').next())
        .unwrap_or("unknown")
}
