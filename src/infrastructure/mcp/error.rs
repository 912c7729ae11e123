use thiserror::Error;

use crate::domain::ports::McpError as DomainMcpError;

/// Errors that can occur during MCP operations
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server already running: {0}")]
    ServerAlreadyRunning(String),

    #[error("Health check timeout for server: {0}")]
    HealthCheckTimeout(String),

    #[error("Failed to spawn server process: {source}")]
    ProcessSpawnError {
        #[from]
        source: std::io::Error,
    },

    #[error("Server process terminated unexpectedly: {0}")]
    ProcessTerminated(String),

    #[error("Failed to communicate with server: {0}")]
    CommunicationError(String),

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpcError { code: i32, message: String },

    #[error("Request '{0}' timed out")]
    RequestTimeout(String),

    #[error("Server restart failed: {0}")]
    RestartFailed(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::CommunicationError(format!("invalid JSON: {err}"))
    }
}

impl From<McpError> for DomainMcpError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ServerNotFound(name) => DomainMcpError::ServerNotFound(name),
            McpError::RequestTimeout(_) | McpError::HealthCheckTimeout(_) => DomainMcpError::Timeout,
            McpError::JsonRpcError { message, .. } => DomainMcpError::ExecutionFailed(message),
            other => DomainMcpError::ConnectionError(other.to_string()),
        }
    }
}

/// Result type alias for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;
