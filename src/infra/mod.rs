pub mod fs_source_reader;
pub mod parquet_table_writer;

pub use fs_source_reader::FsSourceReader;
pub use parquet_table_writer::ParquetTableWriter;
