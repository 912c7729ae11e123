//! Application layer
//!
//! - `tool_servers` decides which tool servers run and builds their providers
//! - `host` launches them and collects the tool catalogue
//! - `tool_registry` maps model function names to server tools
//! - `assistant` runs the chat loop with tool calls

pub mod assistant;
pub mod host;
pub mod tool_registry;
pub mod tool_servers;

pub use assistant::{Assistant, FALLBACK_REPLY, SYSTEM_PROMPT};
pub use host::ToolHost;
pub use tool_registry::{RegisteredTool, ToolRegistry};
pub use tool_servers::{
    LaunchOptions, SYNOLOGY_SKIP_MESSAGE, ServerPlan, SkippedServer, ToolServerKind,
    build_provider, plan_servers, probe_synology,
};
