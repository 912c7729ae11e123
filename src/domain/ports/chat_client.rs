use async_trait::async_trait;

use crate::domain::models::{ChatMessage, ToolDefinition};

/// Errors surfaced by a chat completion backend
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The backend rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The request was rejected and retrying will not help
    #[error("request rejected: {0}")]
    InvalidRequest(String),

    /// Retries were exhausted on a transient failure
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The backend answered without a usable message
    #[error("empty response from model")]
    EmptyResponse,
}

/// Port trait for a chat completion model that supports function tools
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the full history plus the tool catalogue and return the next
    /// assistant message (text, tool calls, or both)
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, ChatError>;
}
