//! CLI command implementations.

pub mod ask;
pub mod auth;
pub mod chat;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

use crate::application::{Assistant, LaunchOptions, ToolHost};
use crate::cli::CliContext;
use crate::cli::output::{create_spinner, warn_line};
use crate::domain::models::Config;
use crate::domain::ports::McpClient;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::openai::{OpenAiClient, OpenAiClientConfig};

/// Running tool servers plus an assistant wired to them
pub(crate) struct Session {
    pub host: ToolHost,
    pub assistant: Assistant,
}

/// Check the API key, start the tool servers and build the assistant
pub(crate) async fn start_session(ctx: &CliContext) -> Result<Session> {
    let api_key = ConfigLoader::require_api_key(&ctx.config)?;
    let chat = OpenAiClient::new(OpenAiClientConfig::from_config(&ctx.config, api_key))
        .context("Failed to create OpenAI client")?;

    let (host, audit) = start_host(ctx).await?;

    let mcp: Arc<dyn McpClient> = host.client();
    let mut assistant = Assistant::new(
        Arc::new(chat),
        mcp,
        host.registry().clone(),
        ctx.config.openai.max_steps,
    );
    if let Some(audit) = audit {
        assistant = assistant.with_audit(audit);
    }

    Ok(Session { host, assistant })
}

/// Launch the tool servers, reporting the ones that were skipped
pub(crate) async fn start_host(ctx: &CliContext) -> Result<(ToolHost, Option<AuditLogger>)> {
    let audit = open_audit(&ctx.config).await;
    let launch = LaunchOptions::current(ctx.config_file.clone(), ctx.verbose)?;

    let spinner = (!ctx.json).then(|| create_spinner("Starting tool servers..."));
    let host = ToolHost::start(&ctx.config, &launch, audit.as_ref()).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let host = host?;

    for skipped in host.skipped() {
        warn_line(&skipped.message());
    }

    Ok((host, audit))
}

/// Open the audit log; a log that cannot be opened only disables auditing
pub(crate) async fn open_audit(config: &Config) -> Option<AuditLogger> {
    let path = config.audit_log_path();
    match AuditLogger::new(&path).await {
        Ok(audit) => Some(audit),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Audit log disabled");
            None
        }
    }
}
