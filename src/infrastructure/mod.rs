//! Infrastructure layer module
//!
//! Adapters and external integrations:
//! - Configuration management
//! - Logging infrastructure
//! - OpenAI chat client
//! - MCP protocol, tool server processes and the stdio server
//! - Google OAuth and Drive, Synology FileStation
//! - The tool servers themselves
//!
//! Implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod google;
pub mod logging;
pub mod mcp;
pub mod openai;
pub mod synology;
pub mod tools;
