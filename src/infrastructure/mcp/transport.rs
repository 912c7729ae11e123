//! Newline-delimited JSON-RPC over a pair of byte streams
//!
//! In production the streams are a child's stdout/stdin; tests use
//! `tokio::io::duplex`.

use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use super::error::{McpError, Result};
use super::types::{JsonRpcError, JsonRpcRequest};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Client side of a JSON-RPC stream
pub struct StdioTransport {
    reader: Lines<BufReader<BoxedReader>>,
    writer: Option<BoxedWriter>,
    next_id: u64,
    timeout: Duration,
}

impl StdioTransport {
    pub fn new<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            reader: BufReader::new(reader).lines(),
            writer: Some(Box::new(writer)),
            next_id: 1,
            timeout,
        }
    }

    /// Send a request and wait for the response carrying the same id.
    ///
    /// Notifications and responses to other ids are skipped. A JSON-RPC
    /// error response becomes [`McpError::JsonRpcError`].
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&JsonRpcRequest::new(id, method, params)).await?;

        match tokio::time::timeout(self.timeout, self.read_response(id)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::RequestTimeout(method.to_string())),
        }
    }

    /// Send a notification (no response expected)
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.send(&JsonRpcRequest::notification(method, params)).await
    }

    /// Close the outgoing stream; a well-behaved server exits on EOF
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    async fn send(&mut self, message: &JsonRpcRequest) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| McpError::CommunicationError("transport closed".to_string()))?;

        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        tracing::trace!(method = %message.method, "-> {}", line.trim_end());

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::CommunicationError(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::CommunicationError(e.to_string()))
    }

    async fn read_response(&mut self, id: u64) -> Result<Value> {
        loop {
            let line = self
                .reader
                .next_line()
                .await
                .map_err(|e| McpError::CommunicationError(e.to_string()))?
                .ok_or_else(|| McpError::ProcessTerminated("stream closed".to_string()))?;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping non-JSON line from server");
                    continue;
                }
            };

            if message.get("id").and_then(Value::as_u64) != Some(id) {
                tracing::trace!("Skipping unrelated message: {}", line);
                continue;
            }

            if let Some(error) = message.get("error") {
                let error: JsonRpcError = serde_json::from_value(error.clone())?;
                return Err(McpError::JsonRpcError {
                    code: error.code,
                    message: error.message,
                });
            }

            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    #[tokio::test]
    async fn test_request_skips_notifications_and_other_ids() {
        let (client_io, server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, mut server_write) = tokio::io::split(server_io);

        let mut transport =
            StdioTransport::new(client_read, client_write, Duration::from_secs(2));

        let server = tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let request: Value =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(request["method"], "ping");
            let id = request["id"].clone();

            let noise = [
                json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}),
                json!({"jsonrpc": "2.0", "id": 999, "result": {}}),
                json!({"jsonrpc": "2.0", "id": id, "result": {"ok": true}}),
            ];
            for message in noise {
                server_write
                    .write_all(format!("{message}\n").as_bytes())
                    .await
                    .unwrap();
            }
        });

        let result = transport.request("ping", None).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_maps_to_json_rpc_error() {
        let (client_io, server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, mut server_write) = tokio::io::split(server_io);

        let mut transport =
            StdioTransport::new(client_read, client_write, Duration::from_secs(2));

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let request: Value =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            let reply = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32601, "message": "Method not found: foo"}
            });
            server_write
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        });

        let err = transport.request("foo", None).await.unwrap_err();
        assert!(matches!(err, McpError::JsonRpcError { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_eof_is_process_terminated() {
        let (client_io, server_io) = duplex(64);
        let (client_read, client_write) = tokio::io::split(client_io);
        drop(server_io);

        let mut transport =
            StdioTransport::new(client_read, client_write, Duration::from_secs(2));

        let err = transport.request("ping", None).await.unwrap_err();
        assert!(matches!(
            err,
            McpError::ProcessTerminated(_) | McpError::CommunicationError(_)
        ));
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (client_io, _server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);

        let mut transport =
            StdioTransport::new(client_read, client_write, Duration::from_millis(50));

        let err = transport.request("ping", None).await.unwrap_err();
        assert!(matches!(err, McpError::RequestTimeout(method) if method == "ping"));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (client_io, _server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);

        let mut transport =
            StdioTransport::new(client_read, client_write, Duration::from_millis(50));
        transport.close().await;

        assert!(transport.is_closed());
        assert!(transport.notify("notifications/initialized", None).await.is_err());
    }
}
