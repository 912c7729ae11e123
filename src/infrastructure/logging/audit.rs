//! Audit logging for file operations
//!
//! Provides a structured JSON-lines trail of:
//! - Tool invocations requested by the model, with their outcome
//! - Tool servers started or skipped by the host
//! - Completed OAuth authorisations

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Audit logger for tool activity
#[derive(Clone)]
pub struct AuditLogger {
    log_file: Arc<Mutex<File>>,
}

/// Audit event types for categorizing operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ToolCalled,
    ToolFailed,
    ServerStarted,
    ServerSkipped,
    AuthCompleted,
}

/// Outcome of an audited operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// Complete audit event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub operation: String,
    pub actor: String,
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub metadata: Option<Value>,
}

impl AuditLogger {
    /// Create a new audit logger writing to the specified file
    ///
    /// Creates parent directories if they don't exist
    /// Opens file in append mode to preserve existing audit trail
    pub async fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref();

        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create audit log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .context("failed to open audit log file")?;

        Ok(Self {
            log_file: Arc::new(Mutex::new(file)),
        })
    }

    /// Log an audit event
    ///
    /// Writes the event as a JSON line to the audit log file
    /// Also emits a tracing info event for structured logging
    pub async fn log_event(&self, event: AuditEvent) -> Result<()> {
        let json = serde_json::to_string(&event).context("failed to serialize audit event")?;

        {
            let mut file = self
                .log_file
                .lock()
                .map_err(|e| anyhow::anyhow!("audit log mutex poisoned: {}", e))?;

            writeln!(file, "{}", json).context("failed to write audit event")?;
            file.flush().context("failed to flush audit log")?;
        }

        info!(
            event_type = ?event.event_type,
            operation = %event.operation,
            actor = %event.actor,
            resource_id = ?event.resource_id,
            outcome = ?event.outcome,
            "audit event"
        );

        Ok(())
    }

    /// Record a tool call made on behalf of the model
    ///
    /// # Arguments
    /// * `server` - Tool server that handled the call
    /// * `tool` - Tool name on that server
    /// * `error` - Failure message, `None` on success
    /// * `arguments` - Arguments the model supplied
    pub async fn log_tool_call(
        &self,
        server: &str,
        tool: &str,
        error: Option<&str>,
        arguments: Option<Value>,
    ) -> Result<()> {
        let (event_type, outcome) = match error {
            None => (AuditEventType::ToolCalled, AuditOutcome::Success),
            Some(_) => (AuditEventType::ToolFailed, AuditOutcome::Failure),
        };

        let metadata = match (arguments, error) {
            (None, None) => None,
            (arguments, error) => Some(serde_json::json!({
                "arguments": arguments,
                "error": error,
            })),
        };

        self.log_event(AuditEvent {
            timestamp: Utc::now(),
            event_type,
            operation: tool.to_string(),
            actor: "assistant".to_string(),
            resource_id: Some(server.to_string()),
            outcome,
            metadata,
        })
        .await
    }

    /// Record a tool server start, or the reason it was skipped
    pub async fn log_server(&self, server: &str, skipped_reason: Option<&str>) -> Result<()> {
        let (event_type, outcome, metadata) = match skipped_reason {
            None => (AuditEventType::ServerStarted, AuditOutcome::Success, None),
            Some(reason) => (
                AuditEventType::ServerSkipped,
                AuditOutcome::Failure,
                Some(serde_json::json!({ "reason": reason })),
            ),
        };

        self.log_event(AuditEvent {
            timestamp: Utc::now(),
            event_type,
            operation: "start_server".to_string(),
            actor: "host".to_string(),
            resource_id: Some(server.to_string()),
            outcome,
            metadata,
        })
        .await
    }

    /// Record a completed OAuth authorisation for a provider
    pub async fn log_auth(&self, provider: &str) -> Result<()> {
        self.log_event(AuditEvent {
            timestamp: Utc::now(),
            event_type: AuditEventType::AuthCompleted,
            operation: "authorize".to_string(),
            actor: "user".to_string(),
            resource_id: Some(provider.to_string()),
            outcome: AuditOutcome::Success,
            metadata: None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_events(path: &Path) -> Vec<AuditEvent> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_audit_logger_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested/dir/audit.log");

        let _logger = AuditLogger::new(&log_path).await.unwrap();
        assert!(log_path.exists());
    }

    #[tokio::test]
    async fn test_tool_call_success_and_failure() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::new(&log_path).await.unwrap();

        logger
            .log_tool_call("local", "list_files", None, Some(serde_json::json!({"directory": "~"})))
            .await
            .unwrap();
        logger
            .log_tool_call("syno", "delete_file", Some("not connected"), None)
            .await
            .unwrap();

        let events = read_events(&log_path);
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].event_type, AuditEventType::ToolCalled);
        assert_eq!(events[0].operation, "list_files");
        assert_eq!(events[0].resource_id.as_deref(), Some("local"));
        assert_eq!(events[0].outcome, AuditOutcome::Success);

        assert_eq!(events[1].event_type, AuditEventType::ToolFailed);
        assert_eq!(events[1].outcome, AuditOutcome::Failure);
        assert_eq!(
            events[1].metadata.as_ref().unwrap()["error"],
            "not connected"
        );
    }

    #[tokio::test]
    async fn test_server_and_auth_events() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::new(&log_path).await.unwrap();

        logger.log_server("local", None).await.unwrap();
        logger
            .log_server("syno", Some("NAS_HOST is not set"))
            .await
            .unwrap();
        logger.log_auth("gdrive").await.unwrap();

        let events = read_events(&log_path);
        assert_eq!(events[0].event_type, AuditEventType::ServerStarted);
        assert_eq!(events[1].event_type, AuditEventType::ServerSkipped);
        assert_eq!(
            events[1].metadata.as_ref().unwrap()["reason"],
            "NAS_HOST is not set"
        );
        assert_eq!(events[2].event_type, AuditEventType::AuthCompleted);
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");

        let logger = AuditLogger::new(&log_path).await.unwrap();

        let mut handles = vec![];
        for i in 0..10 {
            let logger_clone = logger.clone();
            handles.push(tokio::spawn(async move {
                logger_clone
                    .log_tool_call("local", &format!("tool{i}"), None, None)
                    .await
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(read_events(&log_path).len(), 10);
    }
}
