//! Catalogue of the tools offered to the model
//!
//! Each server's tools are exposed as `<server>__<tool>` so equally named
//! tools on different servers stay distinct. Bare names still resolve, to
//! the first server (in start order) that has the tool.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::models::{ToolDefinition, ToolInfo};
use crate::domain::ports::McpClient;

const QUALIFIER: &str = "__";

/// Function names accepted by the chat API: `^[a-zA-Z0-9_-]{1,64}$`
const MAX_FUNCTION_NAME_LEN: usize = 64;

/// A tool together with the server that provides it
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTool {
    pub server: String,
    pub qualified_name: String,
    pub info: ToolInfo,
}

impl RegisteredTool {
    /// Function definition sent to the model
    pub fn definition(&self) -> ToolDefinition {
        let description = match self.info.description.as_deref() {
            Some(desc) if !desc.is_empty() => format!("[{}] {desc}", self.server),
            _ => format!("[{}] {}", self.server, self.info.name),
        };
        ToolDefinition::function(
            &self.qualified_name,
            description,
            parameters_schema(&self.info.input_schema),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Collect the tools of every connected server.
    ///
    /// A server whose listing fails is left out with a warning.
    pub async fn discover(client: &dyn McpClient) -> Self {
        let mut listings = Vec::new();
        for server in client.servers().await {
            match client.list_tools(&server).await {
                Ok(tools) => listings.push((server, tools)),
                Err(e) => warn!(server = %server, error = %e, "Failed to list tools"),
            }
        }
        Self::from_listings(listings)
    }

    /// Build from `(server, tools)` pairs in server order
    pub fn from_listings(listings: Vec<(String, Vec<ToolInfo>)>) -> Self {
        let mut tools: Vec<RegisteredTool> = Vec::new();

        for (server, infos) in listings {
            for info in infos {
                let base = function_name(&server, &info.name);
                let mut qualified_name = base.clone();
                let mut suffix = 2;
                while tools.iter().any(|t| t.qualified_name == qualified_name) {
                    qualified_name = with_suffix(&base, suffix);
                    suffix += 1;
                }

                debug!(server = %server, tool = %info.name, %qualified_name, "Registered tool");
                tools.push(RegisteredTool {
                    server: server.clone(),
                    qualified_name,
                    info,
                });
            }
        }

        Self { tools }
    }

    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(RegisteredTool::definition).collect()
    }

    /// Find the tool behind a function name the model called
    pub fn resolve(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools
            .iter()
            .find(|t| t.qualified_name == name)
            .or_else(|| self.tools.iter().find(|t| t.info.name == name))
    }
}

/// `<server>__<tool>` restricted to the characters and length the chat
/// API allows
fn function_name(server: &str, tool: &str) -> String {
    let raw = format!("{server}{QUALIFIER}{tool}");
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    name.truncate(MAX_FUNCTION_NAME_LEN);
    name
}

fn with_suffix(base: &str, suffix: usize) -> String {
    let tail = format!("_{suffix}");
    let mut name = base.to_string();
    name.truncate(MAX_FUNCTION_NAME_LEN - tail.len());
    name.push_str(&tail);
    name
}

/// Tool schemas must be JSON objects; anything else becomes an empty
/// object schema.
fn parameters_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) if !map.is_empty() => {
            let mut map = map.clone();
            map.entry("type").or_insert_with(|| json!("object"));
            map.entry("properties").or_insert_with(|| json!({}));
            Value::Object(map)
        }
        _ => json!({ "type": "object", "properties": {} }),
    }
}
