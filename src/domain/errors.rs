//! Domain errors for the filesystem assistant.

use thiserror::Error;

use super::ports::{ChatError, McpError};

/// Errors raised by a tool while it executes a call.
///
/// These never abort a chat turn: the host reports them back to the model as
/// the tool result so it can correct itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    PathOutsideRoot(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("remote service error: {0}")]
    Remote(String),

    #[error("{0}")]
    NotConnected(String),
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound(err.to_string())
        } else {
            ToolError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}

/// Domain-level errors that can occur while the assistant handles a prompt.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Chat completion failed: {0}")]
    Chat(#[from] ChatError),

    #[error("Tool server error: {0}")]
    Mcp(#[from] McpError),

    #[error("No tool servers are available")]
    NoToolServers,
}

pub type DomainResult<T> = Result<T, DomainError>;
