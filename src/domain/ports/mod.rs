//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - ChatClient: chat completion with function tools
//! - McpClient: MCP tool server operations
//! - ToolProvider: a set of tools served by a tool server
//!
//! These traits keep the assistant loop independent of OpenAI, of the
//! JSON-RPC transport, and of the storage backends behind each tool.

pub mod chat_client;
pub mod mcp_client;
pub mod tool_provider;

pub use chat_client::{ChatClient, ChatError};
pub use mcp_client::{McpClient, McpError};
pub use tool_provider::ToolProvider;
