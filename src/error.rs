use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Surrogate key space exhausted for partition {partition}")]
    SurrogateKeyExhausted { partition: usize },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Write of table '{table}' failed: {message}")]
    WriteFailure { table: String, message: String },

    #[error("Run failed, tables not written: {}", failed_tables.join(", "))]
    RunFailed { failed_tables: Vec<String> },
}

impl EtlError {
    pub fn write_failure(table: &str, err: impl std::fmt::Display) -> Self {
        EtlError::WriteFailure {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
