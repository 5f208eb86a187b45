use crate::error::{Result, SupervisorError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Stdout,
    Stderr,
    Info,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Stdout => write!(f, "STDOUT"),
            LogLevel::Stderr => write!(f, "STDERR"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Destination for the helper's output and lifecycle lines
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, level: LogLevel, message: &str);

    /// Flush and release the destination; later writes may be dropped
    async fn close(&self) {}
}

/// Sink that only forwards to `tracing`
pub struct TracingSink;

#[async_trait]
impl OutputSink for TracingSink {
    async fn write(&self, level: LogLevel, message: &str) {
        trace_line(level, message);
    }
}

fn trace_line(level: LogLevel, message: &str) {
    match level {
        LogLevel::Stdout | LogLevel::Info => info!(target: "server_output", "{}", message),
        LogLevel::Stderr => warn!(target: "server_output", "[ERROR] {}", message),
        LogLevel::Error => error!(target: "server_output", "{}", message),
    }
}

/// Output log writing JSON lines to `<log dir>/<name>.log`
pub struct OutputLog {
    log_file_path: PathBuf,
    log_file: Mutex<Option<File>>,
}

impl OutputLog {
    /// Open (or create) the output log for `name` in `log_dir`
    pub async fn open(name: &str, log_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(log_dir).await?;
        let log_file_path = Self::path_for(name, log_dir);

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file_path)
            .await?;

        Ok(Self {
            log_file_path,
            log_file: Mutex::new(Some(log_file)),
        })
    }

    pub fn path_for(name: &str, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("{name}.log"))
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }

    /// Append one entry in JSON Line format
    pub async fn log_entry(&self, level: LogLevel, message: &str) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.trim().to_string(),
        };

        let json_line = serde_json::to_string(&entry)?;
        let log_line = format!("{json_line}\n");

        let mut guard = self.log_file.lock().await;
        if let Some(file) = guard.as_mut() {
            file.write_all(log_line.as_bytes()).await?;
            file.flush().await?;
        }

        Ok(())
    }

}

#[async_trait]
impl OutputSink for OutputLog {
    async fn write(&self, level: LogLevel, message: &str) {
        trace_line(level, message);
        if let Err(e) = self.log_entry(level, message).await {
            error!("Failed to write output log {}: {}", self.log_file_path.display(), e);
        }
    }

    async fn close(&self) {
        if let Some(mut file) = self.log_file.lock().await.take() {
            if let Err(e) = file.flush().await {
                warn!("Failed to flush output log {}: {}", self.log_file_path.display(), e);
            }
        }
    }
}

/// Read entries back, keeping the last `max_lines` when given
pub async fn read_output_log(path: &Path, max_lines: Option<usize>) -> Result<Vec<LogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).await.map_err(SupervisorError::IoError)?;
    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();

    while let Some(line) = lines.next_line().await? {
        // Partially written trailing lines are skipped
        if let Ok(entry) = serde_json::from_str::<LogEntry>(line.trim()) {
            entries.push(entry);
        }
    }

    if let Some(max) = max_lines {
        if entries.len() > max {
            entries = entries.split_off(entries.len() - max);
        }
    }

    Ok(entries)
}
