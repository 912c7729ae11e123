use crate::infrastructure::mcp::{error::McpError, error::Result, server_manager::McpServerManager};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// When and how hard a tool server is pinged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPolicy {
    pub every: Duration,
    pub timeout: Duration,
    /// Misses in a row before the process is restarted
    pub restart_after: u32,
}

impl Default for PingPolicy {
    fn default() -> Self {
        Self {
            every: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            restart_after: 3,
        }
    }
}

/// What a watcher does after one ping
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Wait,
    Restart,
}

/// Counts missed pings for one server
#[derive(Debug, Default)]
struct Misses {
    count: u32,
}

impl Misses {
    fn answered(&mut self) -> Option<u32> {
        let previous = std::mem::take(&mut self.count);
        (previous > 0).then_some(previous)
    }

    fn missed(&mut self, limit: u32) -> Next {
        self.count += 1;
        if self.count >= limit {
            Next::Restart
        } else {
            Next::Wait
        }
    }
}

/// Pings running tool servers and restarts the ones that stop answering
pub struct HealthMonitor {
    manager: Arc<McpServerManager>,
    policy: PingPolicy,
}

impl HealthMonitor {
    pub fn new(manager: Arc<McpServerManager>) -> Self {
        Self {
            manager,
            policy: PingPolicy::default(),
        }
    }

    pub fn with_config(
        manager: Arc<McpServerManager>,
        check_interval: Duration,
        max_failures: u32,
        health_check_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            policy: PingPolicy {
                every: check_interval,
                timeout: health_check_timeout,
                restart_after: max_failures,
            },
        }
    }

    /// Spawn a watcher for `server_name`.
    ///
    /// The watcher ends on the shutdown broadcast or once the server is no
    /// longer registered with the manager.
    pub fn start_monitoring(
        &self,
        server_name: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let policy = self.policy;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(policy.every);
            ticker.tick().await;
            let mut misses = Misses::default();
            debug!(server = %server_name, every = ?policy.every, "Watching tool server");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let outcome = Self::health_check(&manager, &server_name, policy.timeout).await;
                        let next = match outcome {
                            Ok(()) => {
                                if let Some(missed) = misses.answered() {
                                    info!(server = %server_name, missed, "Tool server answering again");
                                }
                                Next::Wait
                            }
                            Err(McpError::ServerNotFound(_)) => break,
                            Err(e) => {
                                warn!(server = %server_name, miss = misses.count + 1, error = %e, "Ping failed");
                                misses.missed(policy.restart_after)
                            }
                        };

                        if next == Next::Restart {
                            match manager.restart_server(&server_name).await {
                                Ok(_) => {
                                    misses.answered();
                                }
                                Err(e) => error!(server = %server_name, error = %e, "Restart failed"),
                            }
                        }
                    }
                }
            }

            debug!(server = %server_name, "Stopped watching tool server");
        })
    }

    /// Send one `ping` and wait at most `timeout` for the reply.
    ///
    /// A server busy with another request counts as alive; that request is
    /// already bounded by the request timeout.
    pub async fn health_check(
        manager: &McpServerManager,
        server_name: &str,
        timeout: Duration,
    ) -> Result<()> {
        let transport = manager.get_transport(server_name).await?;
        let Ok(mut transport) = transport.try_lock() else {
            debug!(server = %server_name, "Request in flight, ping skipped");
            return Ok(());
        };

        tokio::time::timeout(timeout, transport.request("ping", Some(json!({}))))
            .await
            .map_err(|_| McpError::HealthCheckTimeout(server_name.to_string()))?
            .map(|_| ())
    }
}
