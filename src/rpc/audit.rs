//! Dispatcher audit log
//!
//! Appends one JSONL entry per dispatched page request for compliance and
//! debugging. Params and results are never written: they can carry message
//! payloads and signatures.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    method: &'a str,
    request_id: &'a str,
    error: Option<String>,
    duration_ms: u64,
    status: &'static str,
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// JSONL audit trail shared by all dispatcher tasks
#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    /// Create a new audit log
    ///
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter::new(log_path.into()))),
        }
    }

    /// Record the outcome of one dispatch
    pub async fn record(
        &self,
        method: &str,
        request_id: &str,
        outcome: &Result<Value>,
        duration_ms: u64,
    ) {
        let (error, status) = match outcome {
            Ok(_) => (None, "success"),
            Err(e) => (Some(e.to_string()), "error"),
        };

        let entry = AuditEntry {
            timestamp: Utc::now(),
            entry_type: "dispatch",
            method,
            request_id,
            error,
            duration_ms,
            status,
        };

        let writer = self.writer.lock().await;
        // Audit logging never fails a request
        if let Err(e) = writer.write(&entry).await {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}
