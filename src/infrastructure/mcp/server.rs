//! Serving side of the protocol
//!
//! [`McpServer`] exposes a [`ToolProvider`] over any line-oriented byte
//! stream. `fsassist serve <kind>` runs it on stdin/stdout; all logging
//! goes to stderr since stdout carries JSON-RPC.

use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::error::{McpError, Result};
use super::types::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, error_codes,
};
use crate::domain::errors::ToolError;
use crate::domain::ports::ToolProvider;

/// JSON-RPC server for one tool provider
pub struct McpServer {
    provider: Arc<dyn ToolProvider>,
}

impl McpServer {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self { provider }
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn serve_stdio(self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests line by line until the reader reaches EOF
    pub async fn serve<R, W>(self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(server = %self.provider.server_name(), "Tool server ready");

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| McpError::CommunicationError(e.to_string()))?
        {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer
                    .write_all(out.as_bytes())
                    .await
                    .map_err(|e| McpError::CommunicationError(e.to_string()))?;
                writer
                    .flush()
                    .await
                    .map_err(|e| McpError::CommunicationError(e.to_string()))?;
            }
        }

        info!(server = %self.provider.server_name(), "Input closed, tool server exiting");
        Ok(())
    }

    /// Handle one raw line; `None` for notifications
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };

        let id = raw.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id.unwrap_or(Value::Null),
                    JsonRpcError::new(error_codes::INVALID_REQUEST, format!("Invalid request: {e}")),
                ));
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        Some(match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(to_value(InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({ "tools": {} }),
                server_info: Implementation {
                    name: self.provider.server_name().to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                instructions: self.provider.instructions(),
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(to_value(ListToolsResult {
                tools: self.provider.tools(),
                next_cursor: None,
            })),
            "tools/call" => self.call_tool(params.unwrap_or(Value::Null)).await,
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, params: Value) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params).map_err(|e| {
            JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Invalid params: {e}"))
        })?;

        if !self.provider.tools().iter().any(|t| t.name == params.name) {
            return Err(unknown_tool(&params.name));
        }

        let arguments = match params.arguments {
            Value::Null => json!({}),
            other => other,
        };

        info!(tool = %params.name, "Tool call");
        let result = match self.provider.call(&params.name, arguments).await {
            Ok(Value::String(text)) => CallToolResult::text(text),
            Ok(value) => CallToolResult::text(value.to_string()),
            Err(ToolError::UnknownTool(name)) => return Err(unknown_tool(&name)),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                CallToolResult::error(e.to_string())
            }
        };

        Ok(to_value(result))
    }
}

fn unknown_tool(name: &str) -> JsonRpcError {
    JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Unknown tool: {name}"))
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        json!({ "error": format!("serialization failed: {e}") })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ToolInfo;
    use async_trait::async_trait;

    struct EchoTools;

    #[async_trait]
    impl ToolProvider for EchoTools {
        fn server_name(&self) -> &str {
            "Echo"
        }

        fn tools(&self) -> Vec<ToolInfo> {
            vec![
                ToolInfo::new("echo", "Echo the input", json!({"type": "object"})),
                ToolInfo::new("fail", "Always fails", json!({"type": "object"})),
            ]
        }

        async fn call(&self, tool: &str, arguments: Value) -> std::result::Result<Value, ToolError> {
            match tool {
                "echo" => Ok(arguments),
                "fail" => Err(ToolError::NotFound("nothing here".to_string())),
                other => Err(ToolError::UnknownTool(other.to_string())),
            }
        }
    }

    fn server() -> McpServer {
        McpServer::new(Arc::new(EchoTools))
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"fsassist","version":"0"}}}"#)
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "Echo");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = server().handle_line("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let response = server().handle_line(r#"{"jsonrpc":"2.0","id":4}"#).await.unwrap();
        assert_eq!(response.id, json!(4));
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"tools/list","params":{}}"#)
            .await
            .unwrap();

        let tools = &response.result.unwrap()["tools"];
        assert_eq!(tools.as_array().unwrap().len(), 2);
        assert_eq!(tools[0]["name"], "echo");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call_success_and_in_band_failure() {
        let ok = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"echo","arguments":{"x":1}}}"#)
            .await
            .unwrap();
        let result: CallToolResult = serde_json::from_value(ok.result.unwrap()).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), r#"{"x":1}"#);

        let failed = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"fail"}}"#)
            .await
            .unwrap();
        let result: CallToolResult = serde_json::from_value(failed.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert_eq!(result.joined_text(), "not found: nothing here");
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#)
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert_eq!(error.message, "Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_serve_until_eof() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n"
        );
        let mut output = Vec::new();

        server().serve(input.as_bytes(), &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let response: JsonRpcResponse = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(response.result, Some(json!({})));
    }
}
