use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::app::ports::{TableSinkPort, TableWriteSummary};
use crate::config::{OutputConfig, ParquetCompression};
use crate::constants::SUCCESS_MARKER;
use crate::error::{EtlError, Result};
use crate::metrics::writer::WriterMetrics;
use crate::pipeline::storage::{Cell, ColumnDef, ColumnType, TableData};

/// Writes tables as Hive-partitioned Parquet under `<root>/<table>/`.
///
/// A table is first written to `<root>/.<table>.staging` and only swapped into
/// place once every file and the `_SUCCESS` marker are on disk.
#[derive(Debug, Clone)]
pub struct ParquetTableWriter {
    root: PathBuf,
    compression: ParquetCompression,
    max_rows_per_file: usize,
}

impl ParquetTableWriter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            root: config.root.clone(),
            compression: config.compression,
            max_rows_per_file: config.max_rows_per_file.max(1),
        }
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    fn staging_dir(&self, table: &str) -> PathBuf {
        self.root.join(format!(".{}.staging", table))
    }

    fn previous_dir(&self, table: &str) -> PathBuf {
        self.root.join(format!(".{}.previous", table))
    }

    /// Move `staging` to `<root>/<table>`. The previous output is set aside
    /// first and put back if the move fails.
    fn swap_into_place(&self, table: &str, staging: &Path) -> Result<()> {
        let target = self.table_dir(table);
        let previous = self.previous_dir(table);
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }

        let had_previous = target.exists();
        if had_previous {
            fs::rename(&target, &previous)?;
        }

        if let Err(e) = fs::rename(staging, &target) {
            if had_previous {
                if let Err(restore) = fs::rename(&previous, &target) {
                    warn!(table, "Failed to restore previous output: {}", restore);
                }
            }
            return Err(e.into());
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&previous) {
                warn!(table, "Failed to remove previous output: {}", e);
            }
        }
        Ok(())
    }

    /// Blocking write of one table, replacing any previous output.
    pub fn write_table_blocking(&self, table: &TableData) -> Result<TableWriteSummary> {
        fs::create_dir_all(&self.root)?;
        let staging = self.staging_dir(table.name);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let staged = self.write_staging(&staging, table);
        let (files, partitions) = match staged {
            Ok(counts) => counts,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(table = table.name, "Failed to remove staging directory: {}", cleanup);
                }
                return Err(e);
            }
        };

        let digest = digest_dir(&staging)?;
        self.swap_into_place(table.name, &staging)?;

        Ok(TableWriteSummary {
            table: table.name.to_string(),
            rows: table.row_count(),
            files,
            partitions,
            digest: Some(digest),
        })
    }

    fn write_staging(&self, staging: &Path, table: &TableData) -> Result<(usize, usize)> {
        fs::create_dir_all(staging)?;
        let columns = table.data_columns();
        let schema = arrow_schema(&columns);
        let props = writer_properties(self.compression);
        let groups = table.partitions();

        let mut files = 0;
        if groups.is_empty() && table.partition_by.is_empty() {
            // Unpartitioned and empty: keep one file so readers still see the schema
            let path = staging.join(self.file_name(files));
            write_parquet_file(&path, &schema, &props, &columns, &[])?;
            files += 1;
        }

        for (dir, rows) in &groups {
            let partition_dir = staging.join(dir);
            fs::create_dir_all(&partition_dir)?;
            for chunk in rows.chunks(self.max_rows_per_file) {
                let path = partition_dir.join(self.file_name(files));
                write_parquet_file(&path, &schema, &props, &columns, chunk)?;
                debug!(table = table.name, file = %path.display(), rows = chunk.len(), "Wrote parquet file");
                files += 1;
            }
        }

        fs::write(staging.join(SUCCESS_MARKER), b"")?;
        Ok((files, groups.len()))
    }

    fn file_name(&self, index: usize) -> String {
        format!("part-{:05}.{}.parquet", index, self.compression.file_tag())
    }
}

#[async_trait]
impl TableSinkPort for ParquetTableWriter {
    async fn write_table(&self, table: TableData) -> Result<TableWriteSummary> {
        let name = table.name;
        let writer = self.clone();
        let started = Instant::now();

        let written = tokio::task::spawn_blocking(move || writer.write_table_blocking(&table))
            .await
            .map_err(|e| EtlError::write_failure(name, e))
            .and_then(|result| {
                result.map_err(|e| match e {
                    EtlError::WriteFailure { .. } => e,
                    other => EtlError::write_failure(name, other),
                })
            });

        match &written {
            Ok(summary) => {
                let secs = started.elapsed().as_secs_f64();
                info!(
                    table = name,
                    rows = summary.rows,
                    files = summary.files,
                    partitions = summary.partitions,
                    duration_secs = secs,
                    "Table written"
                );
                WriterMetrics::record_table_written(summary.rows, summary.files, secs);
            }
            Err(_) => WriterMetrics::record_table_failed(),
        }
        written
    }
}

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Utf8 => DataType::Utf8,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
    }
}

fn arrow_schema(columns: &[(usize, ColumnDef)]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|(_, c)| Field::new(c.name, arrow_type(c.column_type), c.nullable))
            .collect::<Vec<_>>(),
    ))
}

fn writer_properties(compression: ParquetCompression) -> WriterProperties {
    let codec = match compression {
        ParquetCompression::Snappy => Compression::SNAPPY,
        ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
        ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
    };
    WriterProperties::builder().set_compression(codec).build()
}

/// Pull one column out of the row slice, failing on a cell of the wrong type.
fn column_values<'a, T>(
    rows: &[&'a [Cell]],
    index: usize,
    column: &ColumnDef,
    extract: impl Fn(&'a Cell) -> Option<Option<T>>,
) -> Result<Vec<Option<T>>> {
    rows.iter()
        .map(|row| {
            let cell = &row[index];
            extract(cell).ok_or_else(|| {
                EtlError::Config(format!(
                    "column '{}' expects {:?} but row holds {:?}",
                    column.name,
                    column.column_type,
                    cell.column_type()
                ))
            })
        })
        .collect()
}

fn build_array(rows: &[&[Cell]], index: usize, column: &ColumnDef) -> Result<ArrayRef> {
    let array: ArrayRef = match column.column_type {
        ColumnType::Utf8 => {
            let values = column_values(rows, index, column, |c| match c {
                Cell::Utf8(v) => Some(v.as_deref()),
                _ => None,
            })?;
            Arc::new(StringArray::from(values))
        }
        ColumnType::Int32 => {
            let values = column_values(rows, index, column, |c| match c {
                Cell::Int32(v) => Some(*v),
                _ => None,
            })?;
            Arc::new(Int32Array::from(values))
        }
        ColumnType::Int64 => {
            let values = column_values(rows, index, column, |c| match c {
                Cell::Int64(v) => Some(*v),
                _ => None,
            })?;
            Arc::new(Int64Array::from(values))
        }
        ColumnType::Float64 => {
            let values = column_values(rows, index, column, |c| match c {
                Cell::Float64(v) => Some(*v),
                _ => None,
            })?;
            Arc::new(Float64Array::from(values))
        }
        ColumnType::Timestamp => {
            let values = column_values(rows, index, column, |c| match c {
                Cell::Timestamp(v) => Some(v.map(|t| t.and_utc().timestamp_micros())),
                _ => None,
            })?;
            Arc::new(TimestampMicrosecondArray::from(values).with_timezone("UTC"))
        }
    };
    Ok(array)
}

fn write_parquet_file(
    path: &Path,
    schema: &SchemaRef,
    props: &WriterProperties,
    columns: &[(usize, ColumnDef)],
    rows: &[&[Cell]],
) -> Result<()> {
    let arrays = columns
        .iter()
        .map(|(index, column)| build_array(rows, *index, column))
        .collect::<Result<Vec<_>>>()?;
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props.clone()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// SHA-256 over every file under `dir`: relative path, a NUL, then the bytes,
/// in path order.
pub fn digest_dir(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| EtlError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(entry.path())?);
    }
    Ok(hex::encode(hasher.finalize()))
}
