use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::pipeline::storage::TableData;

/// One source file's worth of raw JSON values.
///
/// Lines that could not be parsed are kept as `Value::Null` so row counts
/// survive; `unparseable` counts them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub source: String,
    pub values: Vec<Value>,
    pub unparseable: usize,
}

// Input side
#[async_trait]
pub trait SourceReaderPort: Send + Sync {
    /// Every catalog file, in a stable order.
    async fn read_catalog(&self) -> Result<Vec<RawBatch>>;

    /// Every event-log file, in a stable order. Each batch is one work partition.
    async fn read_event_partitions(&self) -> Result<Vec<RawBatch>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableWriteSummary {
    pub table: String,
    pub rows: usize,
    pub files: usize,
    pub partitions: usize,
    /// SHA-256 over the written files, when the sink produces files
    pub digest: Option<String>,
}

// Output side
#[async_trait]
pub trait TableSinkPort: Send + Sync {
    /// Replace the named table with `table`. Earlier contents are discarded.
    async fn write_table(&self, table: TableData) -> Result<TableWriteSummary>;
}
