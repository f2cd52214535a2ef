//! Storage-neutral table model shared by the use cases and the table sinks.
//!
//! Each output table is a list of typed columns plus the subset used for
//! Hive-style `column=value` partition directories.

pub mod in_memory;
pub mod tables;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::constants::NULL_PARTITION_VALUE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Int32,
    Int64,
    Float64,
    /// Microsecond precision, UTC
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type, nullable: false }
    }

    pub const fn optional(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type, nullable: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Utf8(Option<String>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Timestamp(Option<NaiveDateTime>),
}

impl Cell {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Cell::Utf8(_) => ColumnType::Utf8,
            Cell::Int32(_) => ColumnType::Int32,
            Cell::Int64(_) => ColumnType::Int64,
            Cell::Float64(_) => ColumnType::Float64,
            Cell::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    /// Text used in a partition directory name; `None` for null.
    pub fn partition_text(&self) -> Option<String> {
        match self {
            Cell::Utf8(v) => v.clone().filter(|s| !s.is_empty()),
            Cell::Int32(v) => v.map(|n| n.to_string()),
            Cell::Int64(v) => v.map(|n| n.to_string()),
            Cell::Float64(v) => v.map(|n| n.to_string()),
            Cell::Timestamp(v) => v.map(|t| t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        }
    }
}

/// A row type that can be persisted as a table.
pub trait Table {
    const NAME: &'static str;
    /// Partition columns, outermost directory level first
    const PARTITION_BY: &'static [&'static str];

    fn columns() -> &'static [ColumnDef];

    /// One cell per entry of `columns()`, in the same order
    fn cells(&self) -> Vec<Cell>;
}

/// A fully materialized table ready to hand to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub partition_by: &'static [&'static str],
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    pub fn from_rows<T: Table>(rows: &[T]) -> Self {
        Self {
            name: T::NAME,
            columns: T::columns(),
            partition_by: T::PARTITION_BY,
            rows: rows.iter().map(Table::cells).collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Columns stored inside the files: everything except partition columns.
    pub fn data_columns(&self) -> Vec<(usize, ColumnDef)> {
        self.columns
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, c)| !self.partition_by.contains(&c.name))
            .collect()
    }

    /// Group rows by relative partition directory, keeping row order within each group.
    ///
    /// Unpartitioned tables produce a single group keyed by the empty path.
    pub fn partitions(&self) -> BTreeMap<PathBuf, Vec<&[Cell]>> {
        let indices: Vec<(usize, &str)> = self
            .partition_by
            .iter()
            .filter_map(|name| self.column_index(name).map(|i| (i, *name)))
            .collect();

        let mut groups: BTreeMap<PathBuf, Vec<&[Cell]>> = BTreeMap::new();
        for row in &self.rows {
            let dir: PathBuf = indices
                .iter()
                .map(|(i, name)| partition_dir_name(name, &row[*i]))
                .collect();
            groups.entry(dir).or_default().push(row.as_slice());
        }
        groups
    }
}

/// `column=value` directory segment for one partition value.
pub fn partition_dir_name(column: &str, cell: &Cell) -> String {
    let value = cell
        .partition_text()
        .map(|v| escape_partition_value(&v))
        .unwrap_or_else(|| NULL_PARTITION_VALUE.to_string());
    format!("{}={}", column, value)
}

/// Percent-escape characters that are unsafe in a partition directory name.
pub fn escape_partition_value(value: &str) -> String {
    const SPECIAL: &[char] = &[
        '"', '#', '%', '\'', '*', '/', ':', '=', '?', '\\', '\x7F', '{', '[', ']', '^',
    ];
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c < ' ' || SPECIAL.contains(&c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}
