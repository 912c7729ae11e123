//! Implementation of `fsassist ask`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::start_session;
use crate::cli::CliContext;
use crate::cli::output::{CommandOutput, create_spinner, output};

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt for the assistant (words are joined with spaces)
    #[arg(required = true, trailing_var_arg = true)]
    pub prompt: Vec<String>,
}

impl AskArgs {
    pub fn prompt(&self) -> String {
        self.prompt.join(" ")
    }
}

#[derive(Debug, Serialize)]
pub struct AskOutput {
    pub prompt: String,
    pub reply: String,
}

impl CommandOutput for AskOutput {
    fn to_human(&self) -> String {
        self.reply.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AskArgs, ctx: &CliContext) -> Result<()> {
    let prompt = args.prompt();
    let mut session = start_session(ctx).await?;

    let spinner = (!ctx.json).then(|| create_spinner("Thinking..."));
    let reply = session.assistant.ask(&prompt).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    session.host.shutdown().await;

    output(
        &AskOutput {
            prompt,
            reply: reply?,
        },
        ctx.json,
    );
    Ok(())
}
