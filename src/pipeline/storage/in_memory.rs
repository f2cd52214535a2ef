use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::app::ports::{TableSinkPort, TableWriteSummary};
use crate::error::{EtlError, Result};
use crate::pipeline::storage::TableData;

/// In-memory table sink for dry runs and testing.
///
/// Each write replaces the stored table wholesale, matching the overwrite
/// semantics of the file sink.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTableSink {
    tables: Arc<Mutex<HashMap<String, TableData>>>,
    failing: Arc<HashSet<String>>,
}

impl InMemoryTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects writes to the named tables.
    pub fn failing_on(tables: &[&str]) -> Self {
        Self {
            tables: Arc::default(),
            failing: Arc::new(tables.iter().map(|t| t.to_string()).collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TableData>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn table(&self, name: &str) -> Option<TableData> {
        self.lock().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TableSinkPort for InMemoryTableSink {
    async fn write_table(&self, table: TableData) -> Result<TableWriteSummary> {
        if self.failing.contains(table.name) {
            return Err(EtlError::write_failure(table.name, "sink rejected write"));
        }

        let summary = TableWriteSummary {
            table: table.name.to_string(),
            rows: table.row_count(),
            files: 0,
            partitions: table.partitions().len(),
            digest: None,
        };
        debug!(table = table.name, rows = summary.rows, "Stored table in memory");
        self.lock().insert(table.name.to_string(), table);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserDim;

    fn user(user_id: i32, gender: &str, level: &str) -> UserDim {
        UserDim {
            user_id,
            first_name: None,
            last_name: None,
            gender: Some(gender.to_string()),
            level: Some(level.to_string()),
        }
    }

    #[tokio::test]
    async fn test_write_replaces_previous_contents() {
        let sink = InMemoryTableSink::new();
        let first = TableData::from_rows(&[user(1, "F", "free"), user(2, "M", "paid")]);
        let summary = sink.write_table(first).await.unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.partitions, 2);

        sink.write_table(TableData::from_rows(&[user(3, "F", "free")]))
            .await
            .unwrap();
        assert_eq!(sink.table("users").unwrap().row_count(), 1);
        assert_eq!(sink.table_names(), vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_table_is_rejected() {
        let sink = InMemoryTableSink::failing_on(&["users"]);
        let result = sink.write_table(TableData::from_rows(&[user(1, "F", "free")])).await;
        assert!(matches!(result, Err(EtlError::WriteFailure { ref table, .. }) if table == "users"));
        assert!(sink.table("users").is_none());
    }
}
