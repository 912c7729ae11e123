use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Built-in tool server tags, in the order the host starts them.
pub const BUILTIN_TOOL_SERVERS: [&str; 4] = ["local", "gdrive", "icloud", "syno"];

/// Main configuration structure for the filesystem assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory for tokens, downloads and the audit log
    /// (defaults to `~/.filesystem_assistant`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// OpenAI chat completion settings
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Google Drive OAuth settings
    #[serde(default)]
    pub google: GoogleConfig,

    /// Synology NAS connection
    #[serde(default)]
    pub nas: NasConfig,

    /// Tool server selection and limits
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration for the chat API
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy configuration for the chat API
    #[serde(default)]
    pub retry: RetryConfig,

    /// Additional external MCP servers
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            openai: OpenAiConfig::default(),
            google: GoogleConfig::default(),
            nas: NasConfig::default(),
            tools: ToolsConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            mcp_servers: vec![],
        }
    }
}

impl Config {
    /// Resolved data directory
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => expand_home(dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".filesystem_assistant"),
        }
    }

    /// Path of the cached Google Drive token
    pub fn gdrive_token_path(&self) -> PathBuf {
        match &self.google.token_path {
            Some(path) => expand_home(path),
            None => self.data_dir().join("gdrive_token.json"),
        }
    }

    /// Path of the JSON-lines audit log
    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir().join("audit.log")
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    if path == "~" {
        home()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home().join(rest)
    } else {
        Path::new(path).to_path_buf()
    }
}

/// OpenAI chat completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OpenAiConfig {
    /// API key (usually supplied through `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for every turn
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL for the API (for testing/proxies)
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,

    /// Maximum model calls per user prompt
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

const fn default_openai_timeout() -> u64 {
    120
}

const fn default_max_steps() -> usize {
    10
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_openai_base_url(),
            timeout_secs: default_openai_timeout(),
            max_steps: default_max_steps(),
        }
    }
}

/// Google Drive OAuth configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GoogleConfig {
    /// Path to the OAuth client secrets JSON (`GOOGLE_CLIENT_SECRET_JSON`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_json: Option<String>,

    /// Where the authorised token is cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<String>,
}

/// Synology NAS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NasConfig {
    /// Host name or IP address (`NAS_HOST`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// DSM port (`NAS_PORT`)
    #[serde(default = "default_nas_port")]
    pub port: u16,

    /// Account name (`NAS_USER`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Account password (`NAS_PASS`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,

    /// Use HTTPS
    #[serde(default = "default_true")]
    pub secure: bool,

    /// Verify the NAS TLS certificate (self-signed certificates are common)
    #[serde(default)]
    pub cert_verify: bool,

    /// Request timeout in seconds
    #[serde(default = "default_nas_timeout")]
    pub timeout_secs: u64,
}

const fn default_nas_port() -> u16 {
    5001
}

const fn default_true() -> bool {
    true
}

const fn default_nas_timeout() -> u64 {
    15
}

impl Default for NasConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_nas_port(),
            user: None,
            pass: None,
            secure: default_true(),
            cert_verify: false,
            timeout_secs: default_nas_timeout(),
        }
    }
}

impl NasConfig {
    /// A NAS is configured when a non-empty host is set
    pub fn is_configured(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

/// Tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    /// Built-in tool servers to start
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,

    /// Root for the local filesystem server (defaults to the home directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<String>,

    /// Root for the iCloud Drive server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icloud_root: Option<String>,

    /// Maximum number of search hits returned
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Seconds between tool server health checks
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Timeout for a single tool server request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_enabled_tools() -> Vec<String> {
    BUILTIN_TOOL_SERVERS.iter().map(|s| (*s).to_string()).collect()
}

const fn default_search_limit() -> usize {
    100
}

const fn default_health_check_interval() -> u64 {
    30
}

const fn default_request_timeout() -> u64 {
    120
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            local_root: None,
            icloud_root: None,
            search_limit: default_search_limit(),
            health_check_interval_secs: default_health_check_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ToolsConfig {
    /// Whether a built-in server tag is enabled
    pub fn is_enabled(&self, tag: &str) -> bool {
        self.enabled.iter().any(|t| t == tag)
    }

    /// Root directory of the local filesystem server
    pub fn local_root(&self) -> PathBuf {
        match &self.local_root {
            Some(root) => expand_home(root),
            None => expand_home("~"),
        }
    }

    /// Root directory of the iCloud Drive server
    pub fn icloud_root(&self) -> PathBuf {
        match &self.icloud_root {
            Some(root) => expand_home(root),
            None => expand_home("~/Library/Mobile Documents/com~apple~CloudDocs"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
}

const fn default_requests_per_second() -> f64 {
    5.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// External MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct McpServerConfig {
    /// Server name, used as the tool name prefix
    pub name: String,

    /// Command to execute
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.max_steps, 10);
        assert_eq!(config.nas.port, 5001);
        assert!(config.nas.secure);
        assert!(!config.nas.cert_verify);
        assert_eq!(config.tools.enabled, vec!["local", "gdrive", "icloud", "syno"]);
        assert_eq!(config.tools.search_limit, 100);
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/Documents"), home.join("Documents"));
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
    }

    #[test]
    fn test_data_dir_paths() {
        let config = Config {
            data_dir: Some("/var/fsassist".to_string()),
            ..Default::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("/var/fsassist"));
        assert_eq!(
            config.gdrive_token_path(),
            PathBuf::from("/var/fsassist/gdrive_token.json")
        );
        assert_eq!(config.audit_log_path(), PathBuf::from("/var/fsassist/audit.log"));
    }

    #[test]
    fn test_nas_is_configured() {
        let mut nas = NasConfig::default();
        assert!(!nas.is_configured());
        nas.host = Some("  ".to_string());
        assert!(!nas.is_configured());
        nas.host = Some("192.168.1.5".to_string());
        assert!(nas.is_configured());
    }
}
