//! MCP (Model Context Protocol) infrastructure module
//!
//! - `StdioTransport` - JSON-RPC client over a byte stream pair
//! - `McpServerManager` - tool server process lifecycle
//! - `HealthMonitor` - periodic ping with auto-restart
//! - `McpClientImpl` - the `McpClient` port
//! - `McpServer` - serves a `ToolProvider` over stdio

pub mod client;
pub mod error;
pub mod health_monitor;
pub mod server;
pub mod server_manager;
pub mod transport;
pub mod types;

pub use client::McpClientImpl;
pub use error::{McpError, Result};
pub use health_monitor::HealthMonitor;
pub use server::McpServer;
pub use server_manager::{McpServerManager, ServerSpec};
pub use transport::StdioTransport;
