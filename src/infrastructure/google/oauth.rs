//! OAuth 2.0 for Google Drive
//!
//! Tokens are cached in a JSON file and refreshed on demand. A fresh
//! authorization uses the installed-app flow: the user opens a consent URL
//! and Google redirects back to a one-shot listener on `127.0.0.1`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{GoogleError, Result};

/// Full Drive access, as the assistant renames and deletes files
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens expiring within this window are refreshed first
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client credentials from the Google Cloud console download
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a client-secrets document (`installed` or `web` application)
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(raw)
            .map_err(|e| GoogleError::InvalidSecrets(e.to_string()))?;
        file.installed.or(file.web).ok_or_else(|| {
            GoogleError::InvalidSecrets("expected an \"installed\" or \"web\" section".to_string())
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GoogleError::SecretsNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&raw)
    }
}

/// Cached token as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub expires_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl StoredToken {
    /// Usable for at least the expiry margin
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now >= chrono::Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    fn from_response(response: TokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in),
            scope: response.scope,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,

    #[serde(default = "default_expires_in")]
    expires_in: i64,

    #[serde(default)]
    refresh_token: Option<String>,

    #[serde(default)]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Token source for the Drive client
pub struct GoogleAuth {
    http: ReqwestClient,
    secrets: ClientSecrets,
    token_path: PathBuf,
    cached: Mutex<Option<StoredToken>>,
}

impl GoogleAuth {
    pub fn new(secrets: ClientSecrets, token_path: impl Into<PathBuf>) -> Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            secrets,
            token_path: token_path.into(),
            cached: Mutex::new(None),
        })
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// A valid access token: cached, refreshed, or `AuthorizationRequired`
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = self.read_token_file().await?;
        }

        let Some(token) = cached.as_ref() else {
            return Err(GoogleError::AuthorizationRequired(format!(
                "no token at {}",
                self.token_path.display()
            )));
        };

        if token.is_fresh(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            return Err(GoogleError::AuthorizationRequired(
                "token expired and has no refresh token".to_string(),
            ));
        };

        debug!("Refreshing Google access token");
        let refreshed = self.refresh(&refresh_token).await?;
        self.write_token_file(&refreshed).await?;
        let access = refreshed.access_token.clone();
        *cached = Some(refreshed);
        Ok(access)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let response = self
            .token_request(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await
            .map_err(|e| match e {
                GoogleError::TokenRejected { status, message } if status == 400 || status == 401 => {
                    GoogleError::AuthorizationRequired(format!("refresh rejected: {message}"))
                }
                other => other,
            })?;

        Ok(StoredToken::from_response(response, Some(refresh_token.to_string())))
    }

    /// Consent URL for the installed-app flow
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", DRIVE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )?)
    }

    /// Exchange an authorization code and persist the resulting token
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<StoredToken> {
        let response = self
            .token_request(&[
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let token = StoredToken::from_response(response, None);
        if token.refresh_token.is_none() {
            warn!("Google returned no refresh token; re-authorization will be needed on expiry");
        }
        self.write_token_file(&token).await?;
        *self.cached.lock().await = Some(token.clone());
        Ok(token)
    }

    /// Run the loopback authorization flow.
    ///
    /// `show_url` receives the consent URL once the listener is up; the call
    /// then waits for Google's redirect, checks the state and exchanges the
    /// code.
    pub async fn authorize(&self, show_url: impl FnOnce(&Url)) -> Result<StoredToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = uuid::Uuid::new_v4().simple().to_string();

        show_url(&self.authorization_url(&redirect_uri, &state)?);
        info!(%redirect_uri, "Waiting for Google authorization redirect");

        let code = loop {
            let (stream, _) = listener.accept().await?;
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).await?;

            let Some(outcome) = parse_redirect(&request_line, &state) else {
                // favicon and other stray requests
                respond(reader.get_mut(), "404 Not Found", "").await;
                continue;
            };

            let body = match &outcome {
                Ok(_) => "Authorization complete. You can close this window.",
                Err(_) => "Authorization failed. Return to the terminal for details.",
            };
            respond(reader.get_mut(), "200 OK", body).await;
            break outcome?;
        };

        let token = self.exchange_code(&code, &redirect_uri).await?;
        info!(path = %self.token_path.display(), "Google Drive authorization stored");
        Ok(token)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GoogleError::TokenRejected {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn read_token_file(&self) -> Result<Option<StoredToken>> {
        match tokio::fs::read_to_string(&self.token_path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(token) => Ok(Some(token)),
                Err(e) => {
                    warn!(path = %self.token_path.display(), error = %e, "Ignoring unreadable token cache");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_token_file(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.token_path, serde_json::to_vec_pretty(token)?).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.token_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        Ok(())
    }
}

/// Whether a token cache file exists at `path`
pub fn has_cached_token(path: &Path) -> bool {
    path.is_file()
}

/// Extract the authorization code from the redirect's request line.
/// `None` when the request is not the redirect at all.
fn parse_redirect(request_line: &str, expected_state: &str) -> Option<Result<String>> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(GoogleError::AuthorizationDenied(error)));
    }
    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err(GoogleError::StateMismatch));
    }
    Some(Ok(code))
}

async fn respond(stream: &mut tokio::net::TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "Failed to answer browser redirect");
    }
    let _ = stream.shutdown().await;
}
