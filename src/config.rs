use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub root: PathBuf,
    /// Catalog directory, relative to `root`
    pub song_data: String,
    /// Event log directory, relative to `root`
    pub log_data: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            song_data: "song_data".to_string(),
            log_data: "log_data".to_string(),
        }
    }
}

impl InputConfig {
    pub fn song_data_dir(&self) -> PathBuf {
        self.root.join(&self.song_data)
    }

    pub fn log_data_dir(&self) -> PathBuf {
        self.root.join(&self.log_data)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub compression: ParquetCompression,
    pub max_rows_per_file: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            compression: ParquetCompression::Snappy,
            max_rows_per_file: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

impl ParquetCompression {
    /// Codec tag used in output file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            ParquetCompression::Snappy => "snappy",
            ParquetCompression::Zstd => "zstd",
            ParquetCompression::Uncompressed => "uncompressed",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub listen_addr: Option<String>,
    pub pushgateway_url: Option<String>,
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `ETL_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("ETL_INPUT_ROOT") {
            self.input.root = PathBuf::from(v);
        }
        if let Some(v) = non_empty("ETL_OUTPUT_ROOT") {
            self.output.root = PathBuf::from(v);
        }
        if let Some(v) = non_empty("ETL_METRICS_ADDR") {
            self.metrics.listen_addr = Some(v);
        }
        if let Some(v) = non_empty("ETL_PUSHGATEWAY_URL") {
            self.metrics.pushgateway_url = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.max_rows_per_file == 0 {
            return Err(EtlError::Config(
                "output.max_rows_per_file must be greater than zero".to_string(),
            ));
        }
        if self.input.root == self.output.root {
            return Err(EtlError::Config(format!(
                "input and output roots must differ (both are '{}')",
                self.input.root.display()
            )));
        }
        Ok(())
    }
}
