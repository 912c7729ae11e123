//! Interactive terminal chat.

use anyhow::Result;
use console::style;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::{Session, start_session};
use super::tools::ToolsOutput;
use crate::application::Assistant;
use crate::cli::CliContext;
use crate::cli::output::{CommandOutput, create_spinner};

/// One line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Empty,
    Quit,
    Reset,
    Tools,
    Prompt(&'a str),
}

impl<'a> ChatInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/reset" => Self::Reset,
            "/tools" => Self::Tools,
            prompt => Self::Prompt(prompt),
        }
    }
}

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let Session {
        host,
        mut assistant,
    } = start_session(ctx).await?;

    println!(
        "{}",
        style(format!(
            "Ready with {} tools. /tools lists them, /reset starts over, /quit exits.",
            assistant.registry().len()
        ))
        .dim()
    );

    let result = run_repl(&mut assistant).await;

    info!("Chat session closed");
    host.shutdown().await;
    result
}

async fn run_repl(assistant: &mut Assistant) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style("You:").cyan().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => {}
            ChatInput::Quit => return Ok(()),
            ChatInput::Reset => {
                assistant.reset();
                println!("{}", style("Conversation cleared.").dim());
            }
            ChatInput::Tools => {
                println!("{}", ToolsOutput::new(assistant.registry(), &[]).to_human());
            }
            ChatInput::Prompt(prompt) => {
                let spinner = create_spinner("Thinking...");
                let reply = assistant.ask(prompt).await;
                spinner.finish_and_clear();

                match reply {
                    Ok(text) => println!("{} {text}", style("Assistant:").green().bold()),
                    Err(e) => eprintln!("{} {e}", style("Error:").red().bold()),
                }
            }
        }
    }
}
