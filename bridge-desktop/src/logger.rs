//! File-backed logger sink.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends every entry as one JSON object per line.
pub struct JsonLinesLoggerSink {
    path: PathBuf,
    file: Mutex<File>,
    min_level: LogLevel,
}

impl JsonLinesLoggerSink {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>, min_level: LogLevel) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            min_level,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LoggerSink for JsonLinesLoggerSink {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.file.lock().await.flush().await?;
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
