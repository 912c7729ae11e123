//! MCP (Model Context Protocol) client implementation
//!
//! `McpClientImpl` implements the [`McpClient`] port on top of
//! [`McpServerManager`] (process lifecycle) and [`HealthMonitor`]
//! (periodic ping with auto-restart).

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::domain::models::ToolInfo;
use crate::domain::ports::mcp_client::{McpClient, McpError as DomainMcpError};
use crate::infrastructure::mcp::{
    error::{McpError, Result},
    health_monitor::HealthMonitor,
    server_manager::{McpServerManager, ServerSpec},
    transport::StdioTransport,
    types::{CallToolResult, InitializeResult, ListToolsResult, error_codes},
};

/// MCP client implementation
///
/// Thread-safe; share it as `Arc<McpClientImpl>`.
pub struct McpClientImpl {
    server_manager: Arc<McpServerManager>,
    health_monitor: HealthMonitor,
    health_check_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

impl McpClientImpl {
    /// Create a client
    ///
    /// # Arguments
    /// * `request_timeout` - Timeout applied to each JSON-RPC request
    /// * `health_check_interval` - Period of the background ping
    pub fn new(request_timeout: Duration, health_check_interval: Duration) -> Self {
        let server_manager = Arc::new(McpServerManager::new(request_timeout));
        let health_check_timeout = Duration::from_secs(5);
        let health_monitor = HealthMonitor::with_config(
            server_manager.clone(),
            health_check_interval,
            3,
            health_check_timeout,
        );
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            server_manager,
            health_monitor,
            health_check_timeout,
            shutdown_tx,
            monitors: Mutex::new(Vec::new()),
        }
    }

    /// Start a server process and begin health monitoring
    pub async fn start_server(&self, spec: ServerSpec) -> Result<InitializeResult> {
        let name = spec.name.clone();
        let info = self.server_manager.start_server(spec).await?;

        let handle = self
            .health_monitor
            .start_monitoring(name, self.shutdown_tx.subscribe());
        self.monitors.lock().await.push(handle);

        Ok(info)
    }

    /// Register a server reachable over an existing stream pair
    ///
    /// Attached servers are not health-monitored since they cannot be
    /// restarted.
    pub async fn attach<R, W>(&self, name: &str, reader: R, writer: W) -> Result<InitializeResult>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.server_manager
            .attach_transport(name, reader, writer)
            .await
    }

    /// Handshake details of a running server
    pub async fn server_info(&self, name: &str) -> Result<InitializeResult> {
        self.server_manager.server_info(name).await
    }

    /// Stop health monitoring and every server
    pub async fn shutdown_all(&self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.monitors.lock().await.drain(..) {
            let _ = handle.await;
        }

        self.server_manager.stop_all().await;
        tracing::debug!("Shut down all MCP servers");
    }

    async fn get_transport(&self, server: &str) -> Result<Arc<Mutex<StdioTransport>>> {
        self.server_manager.get_transport(server).await
    }
}

#[async_trait]
impl McpClient for McpClientImpl {
    async fn servers(&self) -> Vec<String> {
        self.server_manager.server_names().await
    }

    async fn list_tools(&self, server_name: &str) -> std::result::Result<Vec<ToolInfo>, DomainMcpError> {
        let transport = self.get_transport(server_name).await?;
        let mut transport = transport.lock().await;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = transport.request("tools/list", Some(params)).await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(McpError::from)?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(server_name = %server_name, count = tools.len(), "Listed tools");
        Ok(tools)
    }

    async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> std::result::Result<String, DomainMcpError> {
        let transport = self.get_transport(server_name).await?;
        let mut transport = transport.lock().await;

        tracing::debug!(server_name = %server_name, tool = %tool_name, "Sending tools/call request");

        let result = transport
            .request(
                "tools/call",
                Some(json!({ "name": tool_name, "arguments": arguments })),
            )
            .await
            .map_err(|e| match e {
                McpError::JsonRpcError { code, message } if code == error_codes::INVALID_PARAMS => {
                    if message.starts_with("Unknown tool") {
                        DomainMcpError::ToolNotFound(tool_name.to_string())
                    } else {
                        DomainMcpError::InvalidArguments(message)
                    }
                }
                other => other.into(),
            })?;

        let result: CallToolResult = serde_json::from_value(result).map_err(McpError::from)?;
        let text = result.joined_text();

        if result.is_error {
            Err(DomainMcpError::ExecutionFailed(text))
        } else {
            Ok(text)
        }
    }

    async fn health_check(&self, server_name: &str) -> std::result::Result<(), DomainMcpError> {
        HealthMonitor::health_check(&self.server_manager, server_name, self.health_check_timeout)
            .await
            .map_err(Into::into)
    }
}
