//! fsassist CLI entry point.

use clap::Parser;

use fsassist::cli::{Cli, CliContext, Commands};
use fsassist::infrastructure::config::ConfigLoader;
use fsassist::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        fsassist::cli::handle_error(err, json);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let dotenv = ConfigLoader::load_dotenv();
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let command = cli.command.unwrap_or(Commands::Chat);
    let log_file = if command.is_server() {
        "fsassist-server.log"
    } else {
        "fsassist.log"
    };
    let _logger = LoggerImpl::init(&LogConfig::from_settings(
        &config.logging,
        cli.verbose,
        log_file,
    )?)?;
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let ctx = CliContext {
        config,
        config_file: cli.config,
        verbose: cli.verbose,
        json: cli.json,
    };

    match command {
        Commands::Chat => fsassist::cli::commands::chat::execute(&ctx).await,
        Commands::Ask(args) => fsassist::cli::commands::ask::execute(args, &ctx).await,
        Commands::Tools => fsassist::cli::commands::tools::execute(&ctx).await,
        Commands::Serve(args) => fsassist::cli::commands::serve::execute(args, &ctx).await,
        Commands::Auth(command) => fsassist::cli::commands::auth::execute(command, &ctx).await,
    }
}
