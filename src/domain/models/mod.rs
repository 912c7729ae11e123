pub mod chat;
pub mod config;
pub mod tool;

pub use chat::{ChatMessage, FunctionCall, FunctionDefinition, Role, ToolCall, ToolDefinition};
pub use config::{
    Config, GoogleConfig, LoggingConfig, McpServerConfig, NasConfig, OpenAiConfig,
    RateLimitConfig, RetryConfig, ToolsConfig,
};
pub use tool::ToolInfo;
