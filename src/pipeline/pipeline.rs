use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::app::log_data_use_case::{LogDataUseCase, LogStats};
use crate::app::ports::{SourceReaderPort, TableSinkPort, TableWriteSummary};
use crate::app::song_data_use_case::{CatalogStats, SongDataUseCase};
use crate::constants::{ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE};
use crate::error::{EtlError, Result};
use crate::metrics::core::time_operation;
use crate::metrics::writer::{WriterMetrics, RUN_DURATION};
use crate::metrics::push_run_summary;
use crate::pipeline::storage::TableData;

/// Which part of the star schema a run rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// songs and artists
    Songs,
    /// songplays, users and time
    Logs,
    All,
}

impl Stage {
    pub fn includes_songs(&self) -> bool {
        matches!(self, Stage::Songs | Stage::All)
    }

    pub fn includes_logs(&self) -> bool {
        matches!(self, Stage::Logs | Stage::All)
    }

    pub fn tables(&self) -> Vec<&'static str> {
        let mut tables = Vec::new();
        if self.includes_songs() {
            tables.extend([SONGS_TABLE, ARTISTS_TABLE]);
        }
        if self.includes_logs() {
            tables.extend([SONGPLAYS_TABLE, USERS_TABLE, TIME_TABLE]);
        }
        tables
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub catalog_stats: CatalogStats,
    pub log_stats: Option<LogStats>,
    /// Successful writes, in write order
    pub tables: Vec<TableWriteSummary>,
    pub failed_tables: Vec<TableFailure>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failed_tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableWriteSummary> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// `Err(RunFailed)` naming every table whose write failed.
    pub fn into_result(self) -> Result<RunReport> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(EtlError::RunFailed {
                failed_tables: self.failed_tables.into_iter().map(|f| f.table).collect(),
            })
        }
    }
}

/// Builds every requested table, then writes each one independently.
///
/// Any read or transformation error aborts the run before the first write.
/// A failed write leaves the other tables' writes untouched.
pub struct Pipeline {
    source: Arc<dyn SourceReaderPort>,
    sink: Arc<dyn TableSinkPort>,
    pushgateway_url: Option<String>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn SourceReaderPort>, sink: Arc<dyn TableSinkPort>) -> Self {
        Self {
            source,
            sink,
            pushgateway_url: None,
        }
    }

    pub fn with_pushgateway(mut self, url: Option<String>) -> Self {
        self.pushgateway_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    #[instrument(skip(self))]
    pub async fn run(&self, stage: Stage) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timing = time_operation(RUN_DURATION);
        info!(%run_id, ?stage, tables = ?stage.tables(), "Starting run");

        let (tables, catalog_stats, log_stats) = self.build_tables(stage).await?;
        info!(tables = tables.len(), "All tables built, writing");

        let mut written = Vec::new();
        let mut failed_tables = Vec::new();
        for table in tables {
            let name = table.name;
            match self.sink.write_table(table).await {
                Ok(summary) => written.push(summary),
                Err(e) => {
                    error!(table = name, "Table write failed: {}", e);
                    failed_tables.push(TableFailure {
                        table: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let duration_secs = timing.elapsed_secs();
        timing.finish();
        WriterMetrics::record_run(failed_tables.is_empty());

        let report = RunReport {
            run_id,
            stage,
            started_at,
            finished_at: Utc::now(),
            duration_secs,
            catalog_stats,
            log_stats,
            tables: written,
            failed_tables,
        };
        info!(
            %run_id,
            succeeded = report.succeeded(),
            duration_secs,
            "Run finished"
        );

        if let Some(url) = &self.pushgateway_url {
            push_run_summary(url, &report).await;
        }
        Ok(report)
    }

    async fn build_tables(
        &self,
        stage: Stage,
    ) -> Result<(Vec<TableData>, CatalogStats, Option<LogStats>)> {
        let song_data = SongDataUseCase::new(Arc::clone(&self.source));
        let catalog = song_data.load_catalog().await?;
        let mut tables = Vec::new();

        if stage.includes_songs() {
            let built = song_data.extract(&catalog);
            tables.push(TableData::from_rows(&built.songs.rows));
            tables.push(TableData::from_rows(&built.artists.rows));
        }

        let mut log_stats = None;
        if stage.includes_logs() {
            let built = LogDataUseCase::new(Arc::clone(&self.source))
                .build(&catalog)
                .await?;
            tables.push(TableData::from_rows(&built.songplays));
            tables.push(TableData::from_rows(&built.users));
            tables.push(TableData::from_rows(&built.time));
            log_stats = Some(built.stats);
        }

        Ok((tables, catalog.stats, log_stats))
    }
}
