//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{ask::AskArgs, auth::AuthCommands, serve::ServeArgs};

#[derive(Parser, Debug)]
#[command(name = "fsassist")]
#[command(about = "Chat assistant for local, iCloud, Google Drive and Synology files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run (interactive chat when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat session
    Chat,

    /// Answer a single prompt and exit
    Ask(AskArgs),

    /// Start the tool servers and list the tools they offer
    Tools,

    /// Run a built-in tool server on stdin/stdout
    Serve(ServeArgs),

    /// Authorize access to a cloud backend
    #[command(subcommand)]
    Auth(AuthCommands),
}

impl Commands {
    /// Whether the command talks to the chat API
    pub fn needs_api_key(&self) -> bool {
        matches!(self, Self::Chat | Self::Ask(_))
    }

    /// Whether the command runs as a tool server child
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Serve(_))
    }
}
