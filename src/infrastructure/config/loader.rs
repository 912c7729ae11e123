use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::models::config::{BUILTIN_TOOL_SERVERS, Config};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid max_steps: {0}. Must be between 1 and 50")]
    InvalidMaxSteps(usize),

    #[error("Invalid NAS port: 0")]
    InvalidNasPort,

    #[error("Unknown tool server '{0}'. Must be one of: local, gdrive, icloud, syno")]
    UnknownToolServer(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidEnvValue(String, String),

    #[error("OPENAI_API_KEY is not set (export it or add it to .env)")]
    MissingApiKey,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. ~/.filesystem_assistant/config.yaml (user config)
    /// 3. ./fsassist.yaml (project config)
    /// 4. Raw credential variables (OPENAI_API_KEY, GOOGLE_CLIENT_SECRET_JSON, NAS_*)
    /// 5. FSASSIST_* environment variables (highest priority)
    ///
    /// `.env` must already be loaded into the process environment; see
    /// [`ConfigLoader::load_dotenv`].
    pub fn load() -> Result<Config> {
        let mut files = Vec::new();
        if let Some(home) = dirs::home_dir() {
            files.push(home.join(".filesystem_assistant").join("config.yaml"));
        }
        files.push(PathBuf::from("fsassist.yaml"));

        Self::load_layers(&files)
    }

    /// Load configuration from a specific file instead of the default locations
    ///
    /// Environment layers still apply on top of the file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        Self::load_layers(&[path.to_path_buf()])
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Load `.env` from the working directory into the process environment.
    ///
    /// Returns the path that was loaded, if any. Variables already set in the
    /// environment win over `.env` entries.
    pub fn load_dotenv() -> Option<PathBuf> {
        dotenvy::dotenv().ok()
    }

    fn load_layers(files: &[PathBuf]) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        for file in files {
            figment = figment.merge(Yaml::file(file));
        }

        let config: Config = figment
            .merge(Serialized::defaults(CredentialOverrides::from_env()?))
            .merge(Env::prefixed("FSASSIST_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        // Validate rate_limit
        let rps = config.rate_limit.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        // Validate retry config
        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.retry.initial_backoff_ms == 0
            || config.retry.initial_backoff_ms >= config.retry.max_backoff_ms
        {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.openai.max_steps == 0 || config.openai.max_steps > 50 {
            return Err(ConfigError::InvalidMaxSteps(config.openai.max_steps));
        }

        if config.nas.port == 0 {
            return Err(ConfigError::InvalidNasPort);
        }

        for tag in &config.tools.enabled {
            if !BUILTIN_TOOL_SERVERS.contains(&tag.as_str()) {
                return Err(ConfigError::UnknownToolServer(tag.clone()));
            }
        }

        // Validate external MCP server configs
        for server in &config.mcp_servers {
            if server.name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "MCP server name cannot be empty".to_string(),
                ));
            }
            if server.command.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "MCP server '{}' command cannot be empty",
                    server.name
                )));
            }
            if BUILTIN_TOOL_SERVERS.contains(&server.name.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "MCP server name '{}' is reserved for a built-in tool server",
                    server.name
                )));
            }
        }

        Ok(())
    }

    /// Return the OpenAI API key or fail with [`ConfigError::MissingApiKey`]
    pub fn require_api_key(config: &Config) -> Result<String, ConfigError> {
        config
            .openai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or(ConfigError::MissingApiKey)
    }
}

/// The credential variables the assistant has always read, mapped onto
/// their config keys. Values are kept as strings so numeric passwords
/// survive untouched.
#[derive(Debug, Default, Serialize)]
struct CredentialOverrides {
    #[serde(skip_serializing_if = "OpenAiOverrides::is_empty")]
    openai: OpenAiOverrides,
    #[serde(skip_serializing_if = "GoogleOverrides::is_empty")]
    google: GoogleOverrides,
    #[serde(skip_serializing_if = "NasOverrides::is_empty")]
    nas: NasOverrides,
}

#[derive(Debug, Default, Serialize)]
struct OpenAiOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct GoogleOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_json: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct NasOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secure: Option<bool>,
}

impl OpenAiOverrides {
    fn is_empty(&self) -> bool {
        self.api_key.is_none()
    }
}

impl GoogleOverrides {
    fn is_empty(&self) -> bool {
        self.client_secret_json.is_none()
    }
}

impl NasOverrides {
    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.user.is_none()
            && self.pass.is_none()
            && self.secure.is_none()
    }
}

impl CredentialOverrides {
    fn from_env() -> Result<Self, ConfigError> {
        let port = match var("NAS_PORT") {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidEnvValue("NAS_PORT".to_string(), raw))?,
            ),
            None => None,
        };
        let secure = match var("NAS_SECURE") {
            Some(raw) => Some(parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvValue("NAS_SECURE".to_string(), raw.clone())
            })?),
            None => None,
        };

        Ok(Self {
            openai: OpenAiOverrides {
                api_key: var("OPENAI_API_KEY"),
            },
            google: GoogleOverrides {
                client_secret_json: var("GOOGLE_CLIENT_SECRET_JSON"),
            },
            nas: NasOverrides {
                host: var("NAS_HOST"),
                port,
                user: var("NAS_USER"),
                pass: var("NAS_PASS"),
                secure,
            },
        })
    }
}

/// Non-empty environment variable
fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::McpServerConfig;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CREDENTIAL_VARS: [&str; 8] = [
        "OPENAI_API_KEY",
        "GOOGLE_CLIENT_SECRET_JSON",
        "NAS_HOST",
        "NAS_PORT",
        "NAS_USER",
        "NAS_PASS",
        "NAS_SECURE",
        "FSASSIST_OPENAI__MODEL",
    ];

    fn clean_env() -> Vec<(&'static str, Option<&'static str>)> {
        CREDENTIAL_VARS.iter().map(|v| (*v, None)).collect()
    }

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
openai:
  model: gpt-4o-mini
  max_steps: 5
nas:
  host: nas.local
  port: 5000
  secure: false
tools:
  enabled: [local, icloud]
logging:
  level: debug
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.max_steps, 5);
        assert_eq!(config.openai.base_url, "https://api.openai.com");
        assert_eq!(config.nas.host.as_deref(), Some("nas.local"));
        assert_eq!(config.nas.port, 5000);
        assert!(!config.nas.secure);
        assert_eq!(config.tools.enabled, vec!["local", "icloud"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.requests_per_second = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_validate_zero_max_retries() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 5_000;
        config.retry.max_backoff_ms = 5_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(5_000, 5_000))
        ));
    }

    #[test]
    fn test_validate_zero_initial_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(0, _))
        ));
    }

    #[test]
    fn test_validate_non_finite_rate_limit() {
        for rps in [f64::NAN, f64::INFINITY] {
            let mut config = Config::default();
            config.rate_limit.requests_per_second = rps;
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidRateLimit(_))
            ));
        }

        let mut config = Config::default();
        config.rate_limit.requests_per_second = 0.5;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_max_steps_bounds() {
        let mut config = Config::default();
        config.openai.max_steps = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxSteps(0))
        ));
        config.openai.max_steps = 51;
        assert!(ConfigLoader::validate(&config).is_err());
        config.openai.max_steps = 50;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_unknown_tool_server() {
        let mut config = Config::default();
        config.tools.enabled.push("dropbox".to_string());
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::UnknownToolServer(name)) if name == "dropbox"
        ));
    }

    #[test]
    fn test_validate_external_server_name_collision() {
        let mut config = Config::default();
        config.mcp_servers.push(McpServerConfig {
            name: "local".to_string(),
            command: "some-server".to_string(),
            args: vec![],
            env: HashMap::new(),
            cwd: None,
        });
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validate_empty_server_command() {
        let mut config = Config::default();
        config.mcp_servers.push(McpServerConfig {
            name: "notes".to_string(),
            command: String::new(),
            args: vec![],
            env: HashMap::new(),
            cwd: None,
        });
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_require_api_key() {
        let mut config = Config::default();
        assert!(matches!(
            ConfigLoader::require_api_key(&config),
            Err(ConfigError::MissingApiKey)
        ));

        config.openai.api_key = Some("  ".to_string());
        assert!(ConfigLoader::require_api_key(&config).is_err());

        config.openai.api_key = Some("sk-test".to_string());
        assert_eq!(ConfigLoader::require_api_key(&config).unwrap(), "sk-test");
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let result = ConfigLoader::load_from_file("/nonexistent/fsassist.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_credential_env_vars_override_file() {
        let file = yaml_file("nas:\n  host: from-file\n  port: 5000\nopenai:\n  model: gpt-4o-mini\n");

        let mut vars = clean_env();
        vars.retain(|(k, _)| !k.starts_with("NAS_HOST") && *k != "NAS_PASS" && *k != "OPENAI_API_KEY");
        vars.push(("NAS_HOST", Some("nas.example.lan")));
        vars.push(("NAS_PASS", Some("123456")));
        vars.push(("OPENAI_API_KEY", Some("sk-from-env")));

        temp_env::with_vars(vars, || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert_eq!(config.nas.host.as_deref(), Some("nas.example.lan"));
            assert_eq!(config.nas.port, 5000, "File value persists when not overridden");
            assert_eq!(config.nas.pass.as_deref(), Some("123456"));
            assert_eq!(config.openai.api_key.as_deref(), Some("sk-from-env"));
            assert_eq!(config.openai.model, "gpt-4o-mini");
        });
    }

    #[test]
    fn test_prefixed_env_wins_over_everything() {
        let file = yaml_file("openai:\n  model: gpt-4o-mini\n");

        let mut vars = clean_env();
        vars.retain(|(k, _)| *k != "FSASSIST_OPENAI__MODEL");
        vars.push(("FSASSIST_OPENAI__MODEL", Some("gpt-4.1")));

        temp_env::with_vars(vars, || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert_eq!(config.openai.model, "gpt-4.1");
        });
    }

    #[test]
    fn test_invalid_nas_port_env_is_rejected() {
        let file = yaml_file("logging:\n  level: info\n");

        let mut vars = clean_env();
        vars.retain(|(k, _)| *k != "NAS_PORT");
        vars.push(("NAS_PORT", Some("not-a-port")));

        temp_env::with_vars(vars, || {
            assert!(ConfigLoader::load_from_file(file.path()).is_err());
        });
    }

    #[test]
    fn test_nas_secure_env_parsing() {
        let file = yaml_file("logging:\n  level: info\n");

        let mut vars = clean_env();
        vars.retain(|(k, _)| *k != "NAS_SECURE");
        vars.push(("NAS_SECURE", Some("false")));

        temp_env::with_vars(vars, || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert!(!config.nas.secure);
        });
    }

    #[test]
    fn test_hierarchical_merging() {
        let base_file = yaml_file("openai:\n  model: gpt-4o-mini\n  max_steps: 4\nlogging:\n  level: info\n  format: json\n");
        let override_file = yaml_file("openai:\n  max_steps: 8\nlogging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.openai.max_steps, 8, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
        assert_eq!(config.openai.model, "gpt-4o-mini");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
