//! Lifecycle of tool server processes
//!
//! Each server is a child process speaking newline-delimited JSON-RPC on
//! stdin/stdout. The manager spawns it, forwards its stderr into tracing,
//! performs the MCP handshake and keeps servers in start order.

use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::{McpError, Result};
use super::transport::StdioTransport;
use super::types::{Implementation, InitializeParams, InitializeResult, PROTOCOL_VERSION};
use crate::domain::models::McpServerConfig;

/// How long a server gets to exit after its stdin is closed
const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a server gets to exit after SIGTERM
#[cfg(unix)]
const TERM_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Command line of a tool server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl From<&McpServerConfig> for ServerSpec {
    fn from(config: &McpServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            cwd: config
                .cwd
                .as_deref()
                .map(crate::domain::models::config::expand_home),
        }
    }
}

struct ManagedServer {
    name: String,
    /// None for in-process servers attached through `attach_transport`
    spec: Option<ServerSpec>,
    transport: Arc<Mutex<StdioTransport>>,
    child: Option<Child>,
    info: InitializeResult,
}

/// MCP server manager for lifecycle management
pub struct McpServerManager {
    servers: RwLock<Vec<ManagedServer>>,
    request_timeout: Duration,
}

impl McpServerManager {
    /// Create a manager whose transports time out after `request_timeout`
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            servers: RwLock::new(Vec::new()),
            request_timeout,
        }
    }

    /// Spawn a server process, perform the handshake and register it
    pub async fn start_server(&self, spec: ServerSpec) -> Result<InitializeResult> {
        if self.contains(&spec.name).await {
            return Err(McpError::ServerAlreadyRunning(spec.name));
        }

        let (child, transport) = self.spawn(&spec)?;
        let transport = Arc::new(Mutex::new(transport));
        let info = match handshake(&transport).await {
            Ok(info) => info,
            Err(e) => {
                shutdown(&spec.name, &transport, Some(child)).await;
                return Err(e);
            }
        };

        info!(
            server_name = %spec.name,
            server_info = %info.server_info.name,
            "Started MCP server"
        );

        self.servers.write().await.push(ManagedServer {
            name: spec.name.clone(),
            spec: Some(spec),
            transport,
            child: Some(child),
            info: info.clone(),
        });

        Ok(info)
    }

    /// Register a server reachable over an existing reader/writer pair
    pub async fn attach_transport<R, W>(
        &self,
        name: &str,
        reader: R,
        writer: W,
    ) -> Result<InitializeResult>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        if self.contains(name).await {
            return Err(McpError::ServerAlreadyRunning(name.to_string()));
        }

        let transport = Arc::new(Mutex::new(StdioTransport::new(
            reader,
            writer,
            self.request_timeout,
        )));
        let info = handshake(&transport).await?;

        self.servers.write().await.push(ManagedServer {
            name: name.to_string(),
            spec: None,
            transport,
            child: None,
            info: info.clone(),
        });

        Ok(info)
    }

    /// Names of registered servers in start order
    pub async fn server_names(&self) -> Vec<String> {
        self.servers
            .read()
            .await
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Handshake result of a registered server
    pub async fn server_info(&self, server_name: &str) -> Result<InitializeResult> {
        self.servers
            .read()
            .await
            .iter()
            .find(|s| s.name == server_name)
            .map(|s| s.info.clone())
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))
    }

    /// Get transport for a specific server
    pub async fn get_transport(&self, server_name: &str) -> Result<Arc<Mutex<StdioTransport>>> {
        self.servers
            .read()
            .await
            .iter()
            .find(|s| s.name == server_name)
            .map(|s| s.transport.clone())
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))
    }

    /// Stop a server process and start it again with the same command line
    pub async fn restart_server(&self, server_name: &str) -> Result<()> {
        let mut servers = self.servers.write().await;
        let entry = servers
            .iter_mut()
            .find(|s| s.name == server_name)
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))?;

        let spec = entry.spec.clone().ok_or_else(|| {
            McpError::RestartFailed(format!("{server_name} is not a managed process"))
        })?;

        shutdown(server_name, &entry.transport, entry.child.take()).await;

        let (child, transport) = self
            .spawn(&spec)
            .map_err(|e| McpError::RestartFailed(e.to_string()))?;
        let transport = Arc::new(Mutex::new(transport));
        let info = handshake(&transport)
            .await
            .map_err(|e| McpError::RestartFailed(e.to_string()))?;

        entry.transport = transport;
        entry.child = Some(child);
        entry.info = info;

        info!(server_name = %server_name, "Restarted MCP server");
        Ok(())
    }

    /// Stop and unregister one server
    pub async fn stop_server(&self, server_name: &str) -> Result<()> {
        let entry = {
            let mut servers = self.servers.write().await;
            let index = servers
                .iter()
                .position(|s| s.name == server_name)
                .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))?;
            servers.remove(index)
        };

        shutdown(&entry.name, &entry.transport, entry.child).await;
        Ok(())
    }

    /// Stop every server, most recently started first
    pub async fn stop_all(&self) {
        let entries: Vec<ManagedServer> = self.servers.write().await.drain(..).collect();
        for entry in entries.into_iter().rev() {
            shutdown(&entry.name, &entry.transport, entry.child).await;
        }
    }

    async fn contains(&self, name: &str) -> bool {
        self.servers.read().await.iter().any(|s| s.name == name)
    }

    fn spawn(&self, spec: &ServerSpec) -> Result<(Child, StdioTransport)> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        debug!(server_name = %spec.name, command = %spec.command, args = ?spec.args, "Spawning MCP server");
        let mut child = command.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::CommunicationError("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::CommunicationError("child stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(spec.name.clone(), stderr);
        }

        Ok((child, StdioTransport::new(stdout, stdin, self.request_timeout)))
    }
}

async fn handshake(transport: &Mutex<StdioTransport>) -> Result<InitializeResult> {
    let params = InitializeParams {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: json!({}),
        client_info: Implementation {
            name: "fsassist".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    let mut transport = transport.lock().await;
    let result = transport
        .request("initialize", Some(serde_json::to_value(params)?))
        .await?;
    let info: InitializeResult = serde_json::from_value(result)
        .map_err(|e| McpError::HandshakeFailed(format!("invalid initialize result: {e}")))?;

    if info.protocol_version != PROTOCOL_VERSION {
        warn!(
            server = %info.server_info.name,
            version = %info.protocol_version,
            "Server negotiated a different protocol version"
        );
    }

    transport.notify("notifications/initialized", None).await?;
    Ok(info)
}

fn forward_stderr(server_name: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(server_name = %server_name, "{}", line);
        }
    });
}

/// Close stdin, wait, then escalate to SIGTERM and finally kill.
async fn shutdown(name: &str, transport: &Mutex<StdioTransport>, child: Option<Child>) {
    transport.lock().await.close().await;

    let Some(mut child) = child else {
        return;
    };

    match tokio::time::timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(server_name = %name, ?status, "MCP server exited");
            return;
        }
        Ok(Err(e)) => warn!(server_name = %name, error = %e, "Error waiting for MCP server"),
        Err(_) => warn!(server_name = %name, "MCP server did not exit after stdin closed"),
    }

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(pid) {
            if kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
                && matches!(
                    tokio::time::timeout(TERM_EXIT_TIMEOUT, child.wait()).await,
                    Ok(Ok(_))
                )
            {
                debug!(server_name = %name, "MCP server exited after SIGTERM");
                return;
            }
        }
    }

    warn!(server_name = %name, "Forcing MCP server shutdown");
    let _ = child.kill().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_server_lookups_fail() {
        let manager = McpServerManager::new(Duration::from_secs(1));

        assert!(matches!(
            manager.get_transport("missing").await,
            Err(McpError::ServerNotFound(_))
        ));
        assert!(matches!(
            manager.restart_server("missing").await,
            Err(McpError::ServerNotFound(_))
        ));
        assert!(manager.server_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let manager = McpServerManager::new(Duration::from_secs(1));
        let spec = ServerSpec {
            name: "ghost".to_string(),
            command: "/definitely/not/a/real/binary".to_string(),
            args: vec![],
            env: HashMap::new(),
            cwd: None,
        };

        let err = manager.start_server(spec).await.unwrap_err();
        assert!(matches!(err, McpError::ProcessSpawnError { .. }));
        assert!(manager.server_names().await.is_empty());
    }

    #[test]
    fn test_spec_from_config() {
        let config = McpServerConfig {
            name: "notes".to_string(),
            command: "notes-mcp".to_string(),
            args: vec!["--stdio".to_string()],
            env: HashMap::from([("NOTES_DIR".to_string(), "/tmp/notes".to_string())]),
            cwd: Some("/tmp".to_string()),
        };

        let spec = ServerSpec::from(&config);
        assert_eq!(spec.name, "notes");
        assert_eq!(spec.args, vec!["--stdio"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
    }
}
