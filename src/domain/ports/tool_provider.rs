use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::ToolError;
use crate::domain::models::ToolInfo;

/// A named set of tools served to the host by an MCP tool server
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Server name reported in `initialize` (e.g. `LocalFS`)
    fn server_name(&self) -> &str;

    /// Short usage hint reported in `initialize`
    fn instructions(&self) -> Option<String> {
        None
    }

    /// Tool descriptors with their argument schemas
    fn tools(&self) -> Vec<ToolInfo>;

    /// Execute one tool with JSON arguments
    async fn call(&self, tool: &str, arguments: Value) -> Result<Value, ToolError>;
}
