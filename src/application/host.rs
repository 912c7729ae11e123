//! Tool host: launches the planned servers and builds the tool registry

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::tool_registry::ToolRegistry;
use super::tool_servers::{LaunchOptions, SkippedServer, plan_servers};
use crate::domain::errors::DomainError;
use crate::domain::models::Config;
use crate::domain::ports::McpClient;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::mcp::McpClientImpl;

/// Running tool servers plus their tool catalogue
pub struct ToolHost {
    client: Arc<McpClientImpl>,
    registry: ToolRegistry,
    skipped: Vec<SkippedServer>,
}

impl ToolHost {
    /// Start every planned server.
    ///
    /// Servers that fail to start are skipped; at least one must come up.
    pub async fn start(
        config: &Config,
        launch: &LaunchOptions,
        audit: Option<&AuditLogger>,
    ) -> Result<Self> {
        let client = Arc::new(McpClientImpl::new(
            Duration::from_secs(config.tools.request_timeout_secs),
            Duration::from_secs(config.tools.health_check_interval_secs),
        ));

        let plan = plan_servers(config, launch).await;
        let mut skipped = plan.skipped;

        for spec in plan.launch {
            let name = spec.name.clone();
            match client.start_server(spec).await {
                Ok(server_info) => {
                    info!(
                        server = %name,
                        server_name = %server_info.server_info.name,
                        "Tool server started"
                    );
                    audit_server(audit, &name, None).await;
                }
                Err(e) => {
                    warn!(server = %name, error = %e, "Tool server failed to start");
                    skipped.push(SkippedServer {
                        name,
                        reason: format!("failed to start: {e}"),
                    });
                }
            }
        }

        for skip in &skipped {
            audit_server(audit, &skip.name, Some(skip.reason.as_str())).await;
        }

        if client.servers().await.is_empty() {
            return Err(DomainError::NoToolServers.into());
        }

        Self::from_client(client, skipped).await
    }

    /// Wrap a client whose servers are already running
    pub async fn from_client(client: Arc<McpClientImpl>, skipped: Vec<SkippedServer>) -> Result<Self> {
        let registry = ToolRegistry::discover(client.as_ref()).await;
        info!(tools = registry.len(), "Tool registry ready");

        Ok(Self {
            client,
            registry,
            skipped,
        })
    }

    pub fn client(&self) -> Arc<McpClientImpl> {
        self.client.clone()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn skipped(&self) -> &[SkippedServer] {
        &self.skipped
    }

    /// Stop health monitoring and every server
    pub async fn shutdown(&self) {
        self.client.shutdown_all().await;
    }
}

async fn audit_server(audit: Option<&AuditLogger>, name: &str, skipped_reason: Option<&str>) {
    if let Some(audit) = audit {
        if let Err(e) = audit.log_server(name, skipped_reason).await {
            warn!(error = %e, "Failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mcp::McpServer;
    use crate::infrastructure::tools::LocalFsTools;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_servers_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = Some(dir.path().display().to_string());
        config.tools.enabled = vec!["syno".to_string()];

        let launch = LaunchOptions {
            executable: PathBuf::from("/nonexistent/fsassist"),
            config_file: None,
            verbose: false,
        };
        let audit = AuditLogger::new(dir.path().join("audit.log")).await.unwrap();

        let err = ToolHost::start(&config, &launch, Some(&audit)).await.err().unwrap();
        assert!(err.to_string().contains("No tool servers"));

        let log = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(log.contains("server_skipped"));
    }

    #[tokio::test]
    async fn test_failed_spawn_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.tools.enabled = vec!["local".to_string()];
        config.tools.local_root = Some(dir.path().display().to_string());

        let launch = LaunchOptions {
            executable: PathBuf::from("/nonexistent/fsassist"),
            config_file: None,
            verbose: false,
        };

        let err = ToolHost::start(&config, &launch, None).await.err().unwrap();
        assert!(err.to_string().contains("No tool servers"));
    }

    #[tokio::test]
    async fn test_from_client_discovers_attached_server() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(McpClientImpl::new(
            Duration::from_secs(5),
            Duration::from_secs(30),
        ));

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let server = McpServer::new(Arc::new(LocalFsTools::new(dir.path(), 100)));
        tokio::spawn(server.serve(server_read, server_write));

        let (client_read, client_write) = tokio::io::split(client_io);
        client.attach("local", client_read, client_write).await.unwrap();

        let host = ToolHost::from_client(client, vec![]).await.unwrap();
        assert_eq!(host.registry().len(), 8);
        assert!(host.registry().resolve("local__search_files").is_some());
        host.shutdown().await;
    }
}
