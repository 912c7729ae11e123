//! Command-line interface

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use console::style;
use std::path::PathBuf;

use crate::domain::models::Config;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: Config,
    /// File passed with `--config`, forwarded to child tool servers
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
    pub json: bool,
}

/// Report a failed command and exit with status 1
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
    std::process::exit(1);
}
