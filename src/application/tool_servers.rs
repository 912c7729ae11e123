//! Tool server catalogue
//!
//! Decides which tool servers the host launches and builds the provider a
//! `fsassist serve <kind>` process runs. Built-in servers are this same
//! binary started with the `serve` subcommand.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::models::Config;
use crate::domain::ports::ToolProvider;
use crate::infrastructure::google::oauth::has_cached_token;
use crate::infrastructure::mcp::ServerSpec;
use crate::infrastructure::synology::FileStationClient;
use crate::infrastructure::tools::{
    GoogleDriveTools, ICloudTools, LocalFsTools, SynologyTools,
};

/// Printed when the NAS is configured but cannot be used
pub const SYNOLOGY_SKIP_MESSAGE: &str = "Skipping Synology tool – check credentials or 2-FA/auth.";

const NAS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Built-in tool servers, in launch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolServerKind {
    Local,
    Gdrive,
    Icloud,
    Syno,
}

impl ToolServerKind {
    pub const ALL: [Self; 4] = [Self::Local, Self::Gdrive, Self::Icloud, Self::Syno];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Gdrive => "gdrive",
            Self::Icloud => "icloud",
            Self::Syno => "syno",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for ToolServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Build the provider served by `fsassist serve <kind>`
pub async fn build_provider(kind: ToolServerKind, config: &Config) -> Result<Arc<dyn ToolProvider>> {
    let provider: Arc<dyn ToolProvider> = match kind {
        ToolServerKind::Local => Arc::new(LocalFsTools::new(
            config.tools.local_root(),
            config.tools.search_limit,
        )),
        ToolServerKind::Icloud => Arc::new(ICloudTools::new(
            config.tools.icloud_root(),
            config.tools.search_limit,
        )),
        ToolServerKind::Gdrive => Arc::new(
            GoogleDriveTools::from_config(config)
                .await
                .context("Failed to set up Google Drive")?,
        ),
        ToolServerKind::Syno => {
            let client = match FileStationClient::new(&config.nas) {
                Ok(client) => Some(Arc::new(
                    client.with_polling(NAS_POLL_INTERVAL, nas_copy_wait(config)),
                )),
                Err(e) => {
                    warn!(error = %e, "NAS tool disabled");
                    None
                }
            };
            Arc::new(SynologyTools::new(client))
        }
    };
    Ok(provider)
}

/// How long `copy_file` waits on a NAS task before reporting it as started.
///
/// The window ends early enough for the login, start and final status calls
/// to fit inside the host's tool request timeout.
fn nas_copy_wait(config: &Config) -> Duration {
    let reserved = config.nas.timeout_secs.saturating_mul(3);
    Duration::from_secs(config.tools.request_timeout_secs.saturating_sub(reserved).max(1))
}

/// How child tool servers are launched
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Binary that implements `serve`
    pub executable: PathBuf,
    /// Explicit config file the host was started with
    pub config_file: Option<PathBuf>,
    /// Forward `--verbose` to the children
    pub verbose: bool,
}

impl LaunchOptions {
    /// Launch children from the running executable
    pub fn current(config_file: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let executable =
            std::env::current_exe().context("Failed to get current executable path")?;
        Ok(Self {
            executable,
            config_file,
            verbose,
        })
    }

    /// Command line for a built-in server
    pub fn spec_for(&self, kind: ToolServerKind) -> ServerSpec {
        let mut args = Vec::new();
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if let Some(file) = &self.config_file {
            args.push("--config".to_string());
            args.push(file.display().to_string());
        }
        args.push("serve".to_string());
        args.push(kind.tag().to_string());

        ServerSpec {
            name: kind.tag().to_string(),
            command: self.executable.display().to_string(),
            args,
            env: HashMap::new(),
            cwd: None,
        }
    }
}

/// A server left out of the launch, with the reason shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedServer {
    pub name: String,
    pub reason: String,
}

impl SkippedServer {
    /// Line printed when the session starts
    pub fn message(&self) -> String {
        if self.reason == SYNOLOGY_SKIP_MESSAGE {
            self.reason.clone()
        } else {
            format!("Skipping {} tool server: {}", self.name, self.reason)
        }
    }
}

/// Servers to launch, in order, plus the ones skipped up front
#[derive(Debug, Default)]
pub struct ServerPlan {
    pub launch: Vec<ServerSpec>,
    pub skipped: Vec<SkippedServer>,
}

impl ServerPlan {
    fn skip(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(server = name, %reason, "Skipping tool server");
        self.skipped.push(SkippedServer {
            name: name.to_string(),
            reason,
        });
    }
}

/// Plan the servers for a session.
///
/// Built-ins come first in their fixed order, filtered by `tools.enabled`,
/// followed by the configured external servers. Backends that cannot work
/// with the current configuration are skipped here instead of failing later.
pub async fn plan_servers(config: &Config, launch: &LaunchOptions) -> ServerPlan {
    let mut plan = ServerPlan::default();

    for kind in ToolServerKind::ALL {
        if !config.tools.is_enabled(kind.tag()) {
            debug!(server = kind.tag(), "Disabled in configuration");
            continue;
        }

        match preflight(kind, config).await {
            Ok(()) => plan.launch.push(launch.spec_for(kind)),
            Err(reason) => plan.skip(kind.tag(), reason),
        }
    }

    for external in &config.mcp_servers {
        plan.launch.push(ServerSpec::from(external));
    }

    info!(
        launch = plan.launch.len(),
        skipped = plan.skipped.len(),
        "Tool server plan ready"
    );
    plan
}

/// Check that a built-in backend is usable before spawning it
async fn preflight(kind: ToolServerKind, config: &Config) -> std::result::Result<(), String> {
    match kind {
        ToolServerKind::Local => Ok(()),
        ToolServerKind::Icloud => {
            let root = config.tools.icloud_root();
            if root.is_dir() {
                Ok(())
            } else {
                Err(format!("iCloud Drive folder not found at {}", root.display()))
            }
        }
        ToolServerKind::Gdrive => gdrive_preflight(config),
        ToolServerKind::Syno => {
            if !config.nas.is_configured() {
                return Err(SYNOLOGY_SKIP_MESSAGE.to_string());
            }
            match probe_synology(config).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    debug!(error = %e, "NAS probe failed");
                    Err(SYNOLOGY_SKIP_MESSAGE.to_string())
                }
            }
        }
    }
}

fn gdrive_preflight(config: &Config) -> std::result::Result<(), String> {
    let Some(secrets) = config.google.client_secret_json.as_deref() else {
        return Err("GOOGLE_CLIENT_SECRET_JSON is not set".to_string());
    };
    let secrets = crate::domain::models::config::expand_home(secrets);
    if !secrets.is_file() {
        return Err(format!("client secrets file not found at {}", secrets.display()));
    }

    let token = config.gdrive_token_path();
    if !has_cached_token(&token) {
        return Err("not authorized yet; run `fsassist auth gdrive`".to_string());
    }
    Ok(())
}

/// Log in and fetch FileStation info once
pub async fn probe_synology(config: &Config) -> Result<()> {
    let client = FileStationClient::new(&config.nas)?;
    client.login().await?;
    client.info().await?;
    Ok(())
}
