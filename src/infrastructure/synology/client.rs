use std::time::{Duration, Instant};

use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::error::{Result, SynologyError};
use crate::domain::models::NasConfig;

const AUTH_CGI: &str = "auth.cgi";
const ENTRY_CGI: &str = "entry.cgi";

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
}

/// How a copy request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Finished,
    /// Still running on the NAS after the wait window
    Running(String),
}

/// FileStation session client.
///
/// Logs in lazily and keeps the session id; when DSM reports an expired
/// session the request is retried once after a fresh login.
pub struct FileStationClient {
    http: ReqwestClient,
    base_url: String,
    user: String,
    pass: String,
    sid: Mutex<Option<String>>,
    poll_interval: Duration,
    task_wait: Duration,
}

impl FileStationClient {
    /// Client for the configured NAS
    pub fn new(config: &NasConfig) -> Result<Self> {
        let (Some(host), Some(user), Some(pass)) = (&config.host, &config.user, &config.pass)
        else {
            return Err(SynologyError::NotConfigured);
        };
        if !config.is_configured() {
            return Err(SynologyError::NotConfigured);
        }

        let scheme = if config.secure { "https" } else { "http" };
        Self::with_base_url(
            &format!("{scheme}://{host}:{}", config.port),
            user,
            pass,
            config.cert_verify,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        user: &str,
        pass: &str,
        cert_verify: bool,
        timeout: Duration,
    ) -> Result<Self> {
        if !cert_verify {
            debug!("NAS certificate verification disabled");
        }

        let http = ReqwestClient::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!cert_verify)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/webapi", base_url.trim_end_matches('/')),
            user: user.to_string(),
            pass: pass.to_string(),
            sid: Mutex::new(None),
            poll_interval: Duration::from_millis(500),
            task_wait: Duration::from_secs(60),
        })
    }

    /// Override background task polling (interval, how long to wait)
    pub fn with_polling(mut self, interval: Duration, wait: Duration) -> Self {
        self.poll_interval = interval;
        self.task_wait = wait;
        self
    }

    /// Open a FileStation session and remember its id
    #[instrument(skip(self), fields(user = %self.user))]
    pub async fn login(&self) -> Result<String> {
        let params = [
            ("api", "SYNO.API.Auth"),
            ("version", "3"),
            ("method", "login"),
            ("account", self.user.as_str()),
            ("passwd", self.pass.as_str()),
            ("session", "FileStation"),
            ("format", "sid"),
        ];
        let envelope = self.get(AUTH_CGI, &params).await?;

        if !envelope.success {
            let code = envelope.error.map_or(0, |e| e.code);
            warn!(code, "NAS login rejected");
            return Err(SynologyError::login(code));
        }

        let sid = envelope.data["sid"]
            .as_str()
            .ok_or_else(|| SynologyError::UnexpectedResponse("login returned no sid".to_string()))?
            .to_string();
        *self.sid.lock().await = Some(sid.clone());
        info!("NAS session opened");
        Ok(sid)
    }

    /// FileStation service information; used to verify a session works
    pub async fn info(&self) -> Result<Value> {
        self.call("SYNO.FileStation.Info", "2", "get", &[]).await
    }

    /// Entry names of a folder. `/` lists the shared folders.
    pub async fn list(&self, path: &str) -> Result<Vec<String>> {
        let path = normalize_path(path);
        let (data, key) = if path == "/" {
            (
                self.call("SYNO.FileStation.List", "2", "list_share", &[])
                    .await?,
                "shares",
            )
        } else {
            (
                self.call("SYNO.FileStation.List", "2", "list", &[("folder_path", path.as_str())])
                    .await?,
                "files",
            )
        };

        let entries = data[key].as_array().ok_or_else(|| {
            SynologyError::UnexpectedResponse(format!("listing has no \"{key}\" array"))
        })?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry["name"].as_str().map(str::to_string))
            .collect())
    }

    /// Delete a file or folder (recursively)
    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.call(
            "SYNO.FileStation.Delete",
            "2",
            "delete",
            &[("path", path.as_str()), ("recursive", "true")],
        )
        .await?;
        info!(%path, "Deleted on NAS");
        Ok(())
    }

    pub async fn rename(&self, path: &str, new_name: &str) -> Result<()> {
        let path = normalize_path(path);
        self.call(
            "SYNO.FileStation.Rename",
            "2",
            "rename",
            &[("path", path.as_str()), ("name", new_name)],
        )
        .await?;
        info!(%path, new_name, "Renamed on NAS");
        Ok(())
    }

    /// Copy `src` into the folder `dest_folder`.
    ///
    /// Waits for the background task up to the polling window. A task still
    /// running after that keeps going on the NAS and its id is returned.
    pub async fn copy(&self, src: &str, dest_folder: &str) -> Result<CopyOutcome> {
        let src = normalize_path(src);
        let dest_folder = normalize_path(dest_folder);
        let started = self
            .call(
                "SYNO.FileStation.CopyMove",
                "3",
                "start",
                &[
                    ("path", src.as_str()),
                    ("dest_folder_path", dest_folder.as_str()),
                    ("overwrite", "false"),
                    ("remove_src", "false"),
                ],
            )
            .await?;

        let task_id = started["taskid"]
            .as_str()
            .ok_or_else(|| SynologyError::UnexpectedResponse("copy returned no taskid".to_string()))?
            .to_string();
        debug!(%task_id, "Copy task started");

        let deadline = Instant::now() + self.task_wait;
        loop {
            let status = self
                .call("SYNO.FileStation.CopyMove", "3", "status", &[("taskid", task_id.as_str())])
                .await?;
            if status["finished"].as_bool().unwrap_or(false) {
                break;
            }
            if Instant::now() + self.poll_interval >= deadline {
                info!(%task_id, %src, %dest_folder, "Copy still running on NAS");
                return Ok(CopyOutcome::Running(task_id));
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        info!(%src, %dest_folder, "Copied on NAS");
        Ok(CopyOutcome::Finished)
    }

    /// Call a FileStation API method with the current session
    async fn call(
        &self,
        api: &str,
        version: &str,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let mut relogged = false;

        loop {
            let current = self.sid.lock().await.clone();
            let sid = match current {
                Some(sid) => sid,
                None => self.login().await?,
            };

            let mut query = vec![("api", api), ("version", version), ("method", method)];
            query.extend_from_slice(params);
            query.push(("_sid", sid.as_str()));

            let envelope = self.get(ENTRY_CGI, &query).await?;
            if envelope.success {
                return Ok(envelope.data);
            }

            let code = envelope.error.map_or(100, |e| e.code);
            if SynologyError::is_session_error(code) && !relogged {
                debug!(code, "NAS session expired, logging in again");
                *self.sid.lock().await = None;
                relogged = true;
                continue;
            }

            warn!(api, method, code, "FileStation request failed");
            return Err(SynologyError::api(code));
        }
    }

    async fn get(&self, cgi: &str, query: &[(&str, &str)]) -> Result<Envelope> {
        let response = self
            .http
            .get(format!("{}/{cgi}", self.base_url))
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// FileStation paths are absolute and start at a shared folder
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
