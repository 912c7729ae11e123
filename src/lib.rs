//! Filesystem Assistant - chat over your files
//!
//! A terminal chat assistant that manages files on the local disk, iCloud
//! Drive, Google Drive and a Synology NAS. The model works through MCP tool
//! servers: each backend runs as `fsassist serve <kind>` and speaks
//! JSON-RPC over stdio, while the host collects their tools and drives the
//! OpenAI chat loop.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and ports
//! - **Application Layer** (`application`): server planning, tool registry, chat loop
//! - **Infrastructure Layer** (`infrastructure`): config, logging, OpenAI, MCP, backends
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use fsassist::application::{LaunchOptions, ToolHost};
//! use fsassist::infrastructure::config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let launch = LaunchOptions::current(None, false)?;
//!     let host = ToolHost::start(&config, &launch, None).await?;
//!     println!("{} tools", host.registry().len());
//!     host.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use application::{Assistant, ToolHost, ToolRegistry, ToolServerKind};
pub use domain::models::{
    ChatMessage, Config, LoggingConfig, McpServerConfig, RateLimitConfig, RetryConfig, ToolInfo,
};
pub use domain::ports::{ChatClient, McpClient, ToolProvider};
pub use infrastructure::config::{ConfigError, ConfigLoader};
