use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool descriptor as advertised by an MCP server in `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema of the tool arguments
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }
}
