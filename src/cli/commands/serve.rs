//! Implementation of `fsassist serve`: one built-in tool server on stdio.

use anyhow::{Result, anyhow};
use clap::Args;
use tracing::info;

use crate::application::{ToolServerKind, build_provider};
use crate::cli::CliContext;
use crate::infrastructure::mcp::McpServer;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Backend to serve
    #[arg(value_parser = ["local", "gdrive", "icloud", "syno"])]
    pub kind: String,
}

pub async fn execute(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let kind = ToolServerKind::from_tag(&args.kind)
        .ok_or_else(|| anyhow!("Unknown tool server: {}", args.kind))?;

    let provider = build_provider(kind, &ctx.config).await?;
    info!(server = %kind, tools = provider.tools().len(), "Serving tools on stdio");

    McpServer::new(provider).serve_stdio().await?;
    info!(server = %kind, "Tool server stopped");
    Ok(())
}
