//! Implementation of `fsassist auth`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use super::open_audit;
use crate::cli::CliContext;
use crate::cli::output::{CommandOutput, output};
use crate::domain::models::config::expand_home;
use crate::infrastructure::google::{ClientSecrets, GoogleAuth};

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Authorize Google Drive in the browser and cache the token
    Gdrive,
}

#[derive(Debug, Serialize)]
pub struct AuthOutput {
    pub provider: String,
    pub token_path: PathBuf,
}

impl CommandOutput for AuthOutput {
    fn to_human(&self) -> String {
        format!(
            "Authorized {}. Token saved to {}",
            self.provider,
            self.token_path.display()
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(command: AuthCommands, ctx: &CliContext) -> Result<()> {
    match command {
        AuthCommands::Gdrive => authorize_gdrive(ctx).await,
    }
}

async fn authorize_gdrive(ctx: &CliContext) -> Result<()> {
    let secrets_path = ctx
        .config
        .google
        .client_secret_json
        .as_deref()
        .context("GOOGLE_CLIENT_SECRET_JSON is not set; point it at the OAuth client secrets file")?;
    let secrets = ClientSecrets::load(&expand_home(secrets_path)).await?;
    let auth = GoogleAuth::new(secrets, ctx.config.gdrive_token_path())?;

    auth.authorize(|url| {
        eprintln!("Open this URL in your browser to authorize Google Drive:\n\n  {url}\n");
    })
    .await
    .context("Google Drive authorization failed")?;

    if let Some(audit) = open_audit(&ctx.config).await {
        if let Err(e) = audit.log_auth("gdrive").await {
            warn!(error = %e, "Failed to write audit event");
        }
    }

    output(
        &AuthOutput {
            provider: "gdrive".to_string(),
            token_path: auth.token_path().to_path_buf(),
        },
        ctx.json,
    );
    Ok(())
}
