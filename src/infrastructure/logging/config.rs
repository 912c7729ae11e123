use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::domain::models::LoggingConfig;

/// Resolved logger settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Console output format
    pub format: LogFormat,

    /// Directory for log files (stderr only when None)
    pub log_dir: Option<PathBuf>,

    /// Log file name prefix
    pub file_name: String,

    /// Log rotation policy
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl LogConfig {
    /// Build logger settings from the loaded configuration.
    ///
    /// `verbose` forces the `debug` level.
    pub fn from_settings(settings: &LoggingConfig, verbose: bool, file_name: &str) -> Result<Self> {
        let format = match settings.format.as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => bail!("Invalid log format: {other}"),
        };
        let rotation = match settings.rotation.as_str() {
            "daily" => RotationPolicy::Daily,
            "hourly" => RotationPolicy::Hourly,
            "never" => RotationPolicy::Never,
            other => bail!("Invalid log rotation: {other}"),
        };

        Ok(Self {
            level: if verbose {
                "debug".to_string()
            } else {
                settings.level.clone()
            },
            format,
            log_dir: settings
                .log_dir
                .as_deref()
                .map(crate::domain::models::config::expand_home),
            file_name: file_name.to_string(),
            rotation,
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            log_dir: None,
            file_name: "fsassist.log".to_string(),
            rotation: RotationPolicy::default(),
        }
    }
}
