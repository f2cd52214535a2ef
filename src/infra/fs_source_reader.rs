use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::app::ports::{RawBatch, SourceReaderPort};
use crate::error::{EtlError, Result};

/// Reads newline-delimited JSON source files from local directories.
///
/// A file may also hold a single pretty-printed JSON document. Lines that do
/// not parse are kept as `Value::Null` so downstream row counts line up.
pub struct FsSourceReader {
    song_dir: PathBuf,
    log_dir: PathBuf,
}

impl FsSourceReader {
    pub fn new(song_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            song_dir: song_dir.into(),
            log_dir: log_dir.into(),
        }
    }

    async fn read_dir(&self, dir: &Path) -> Result<Vec<RawBatch>> {
        let files = list_json_files(dir)?;
        let mut batches = Vec::with_capacity(files.len());
        for path in files {
            let content = tokio::fs::read(&path).await?;
            let source = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .display()
                .to_string();
            let batch = parse_json_content(&source, &content);
            if batch.unparseable > 0 {
                warn!(
                    file = %source,
                    lines = batch.unparseable,
                    "Unparseable JSON lines in source file"
                );
            }
            debug!(file = %source, rows = batch.values.len(), "Read source file");
            batches.push(batch);
        }
        info!(dir = %dir.display(), files = batches.len(), "Source directory read");
        Ok(batches)
    }
}

#[async_trait]
impl SourceReaderPort for FsSourceReader {
    async fn read_catalog(&self) -> Result<Vec<RawBatch>> {
        self.read_dir(&self.song_dir).await
    }

    async fn read_event_partitions(&self) -> Result<Vec<RawBatch>> {
        self.read_dir(&self.log_dir).await
    }
}

/// All `*.json` files under `dir`, recursively, sorted by path.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EtlError::Config(format!(
            "input directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| EtlError::Io(e.into()))?;
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Split file content into JSON values.
///
/// Well-formed content (JSON lines, or one document spread over many lines)
/// is read as a stream. Otherwise each non-blank line is parsed on its own,
/// so invalid JSON or invalid UTF-8 only costs the line it sits on.
pub fn parse_json_content(source: &str, content: &[u8]) -> RawBatch {
    let streamed: std::result::Result<Vec<Value>, _> =
        serde_json::Deserializer::from_slice(content).into_iter::<Value>().collect();
    if let Ok(values) = streamed {
        return RawBatch {
            source: source.to_string(),
            values,
            unparseable: 0,
        };
    }

    let mut unparseable = 0;
    let values = content
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| {
            serde_json::from_slice::<Value>(line).unwrap_or_else(|_| {
                unparseable += 1;
                Value::Null
            })
        })
        .collect();
    RawBatch {
        source: source.to_string(),
        values,
        unparseable,
    }
}
