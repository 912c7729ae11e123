use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::ToolInfo;

/// Error types specific to MCP operations
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout error")]
    Timeout,
}

/// Port trait for MCP (Model Context Protocol) client
///
/// Defines the interface for interacting with running tool servers.
/// Implementations must handle:
/// - Server lookup by name
/// - Tool discovery and invocation
/// - Mapping transport failures onto [`McpError`]
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Names of the connected servers, in start order
    async fn servers(&self) -> Vec<String>;

    /// List the tools a server exposes
    ///
    /// # Errors
    /// - `McpError::ServerNotFound` - no server with that name is running
    /// - `McpError::ConnectionError` - the server stopped answering
    async fn list_tools(&self, server_name: &str) -> Result<Vec<ToolInfo>, McpError>;

    /// Invoke a tool and return its text result
    ///
    /// Failures reported in-band by the server (`isError: true`) come back as
    /// `McpError::ExecutionFailed` carrying the server's message.
    ///
    /// # Errors
    /// - `McpError::ServerNotFound` - server not running (non-retryable)
    /// - `McpError::ToolNotFound` - tool doesn't exist on server (non-retryable)
    /// - `McpError::InvalidArguments` - server rejected the arguments
    /// - `McpError::ExecutionFailed` - tool ran and failed
    /// - `McpError::ConnectionError` - transport failure (retryable)
    /// - `McpError::Timeout` - tool execution timed out (retryable)
    async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<String, McpError>;

    /// Health check for server connectivity
    async fn health_check(&self, server_name: &str) -> Result<(), McpError>;
}
