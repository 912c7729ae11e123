//! Implementation of `fsassist tools`.

use anyhow::Result;
use comfy_table::Table;
use serde::Serialize;

use super::start_host;
use crate::application::{SkippedServer, ToolRegistry};
use crate::cli::CliContext;
use crate::cli::output::{CommandOutput, output, table, truncate};

const DESCRIPTION_WIDTH: usize = 70;

#[derive(Debug, Serialize)]
pub struct ToolRow {
    pub name: String,
    pub server: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ToolsOutput {
    pub tools: Vec<ToolRow>,
    pub skipped: Vec<SkippedServer>,
}

impl ToolsOutput {
    pub fn new(registry: &ToolRegistry, skipped: &[SkippedServer]) -> Self {
        let tools = registry
            .tools()
            .iter()
            .map(|tool| ToolRow {
                name: tool.qualified_name.clone(),
                server: tool.server.clone(),
                description: tool.info.description.clone().unwrap_or_default(),
            })
            .collect();
        Self {
            tools,
            skipped: skipped.to_vec(),
        }
    }
}

impl CommandOutput for ToolsOutput {
    fn to_human(&self) -> String {
        if self.tools.is_empty() {
            return "No tools available.".to_string();
        }
        format!(
            "{}\n\n{} tool{}",
            tool_table(&self.tools),
            self.tools.len(),
            if self.tools.len() == 1 { "" } else { "s" }
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Tool table shown by `tools` and the chat `/tools` command
pub fn tool_table(rows: &[ToolRow]) -> Table {
    let mut t = table(&["Tool", "Server", "Description"]);
    for row in rows {
        t.add_row(vec![
            row.name.clone(),
            row.server.clone(),
            truncate(&row.description, DESCRIPTION_WIDTH),
        ]);
    }
    t
}

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let (host, _audit) = start_host(ctx).await?;
    let result = ToolsOutput::new(host.registry(), host.skipped());
    host.shutdown().await;

    output(&result, ctx.json);
    Ok(())
}
