//! Google Drive v3 REST client

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, RequestBuilder, Response, header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::error::{GoogleError, Result};
use super::oauth::GoogleAuth;

/// Production API host
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com";

const FILE_FIELDS: &str = "files(id,name,mimeType)";

/// File entry as returned to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileName {
    name: String,
}

/// Authenticated Drive client
pub struct DriveClient {
    http: ReqwestClient,
    auth: Arc<GoogleAuth>,
    api_base: String,
    download_dir: PathBuf,
}

impl DriveClient {
    pub fn new(auth: Arc<GoogleAuth>, download_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_base_url(auth, download_dir, DRIVE_API_BASE)
    }

    pub fn with_base_url(
        auth: Arc<GoogleAuth>,
        download_dir: impl Into<PathBuf>,
        api_base: &str,
    ) -> Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(120))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            auth,
            api_base: api_base.trim_end_matches('/').to_string(),
            download_dir: download_dir.into(),
        })
    }

    /// Non-trashed children of a folder (`root` for My Drive)
    #[instrument(skip(self))]
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        self.query(&format!("'{}' in parents and trashed=false", escape_query(folder_id)))
            .await
    }

    /// Non-trashed files whose name contains `query`
    #[instrument(skip(self))]
    pub async fn search_files(&self, query: &str) -> Result<Vec<DriveFile>> {
        self.query(&format!("name contains '{}' and trashed=false", escape_query(query)))
            .await
    }

    pub async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<()> {
        let request = self
            .http
            .patch(self.file_url(file_id))
            .query(&[("fields", "id,name")])
            .json(&json!({ "name": new_name }));
        self.send(request).await?;
        info!(file_id, new_name, "Renamed Drive file");
        Ok(())
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.send(self.http.delete(self.file_url(file_id))).await?;
        info!(file_id, "Deleted Drive file");
        Ok(())
    }

    /// Download a file's content into the download directory
    pub async fn download_file(&self, file_id: &str) -> Result<PathBuf> {
        let meta: FileName = self
            .send(self.http.get(self.file_url(file_id)).query(&[("fields", "name")]))
            .await?
            .json()
            .await?;

        let bytes = self
            .send(self.http.get(self.file_url(file_id)).query(&[("alt", "media")]))
            .await?
            .bytes()
            .await?;

        let file_name = Path::new(&meta.name)
            .file_name()
            .map_or_else(|| file_id.to_string(), |n| n.to_string_lossy().into_owned());
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(file_name);
        tokio::fs::write(&path, &bytes).await?;

        info!(file_id, path = %path.display(), bytes = bytes.len(), "Downloaded Drive file");
        Ok(path)
    }

    /// Upload a local file into a folder with a multipart request
    pub async fn upload_file(&self, local_path: &Path, folder_id: &str) -> Result<DriveFile> {
        let content = tokio::fs::read(local_path).await?;
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GoogleError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no file name", local_path.display()),
                ))
            })?;

        let metadata = json!({ "name": name, "parents": [folder_id] });
        let boundary = format!("fsassist-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, &content)?;

        let request = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .query(&[("uploadType", "multipart"), ("fields", "id,name,mimeType")])
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);

        let file: DriveFile = self.send(request).await?.json().await?;
        info!(file_id = %file.id, name = %file.name, "Uploaded file to Drive");
        Ok(file)
    }

    async fn query(&self, q: &str) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        let fields = format!("nextPageToken,{FILE_FIELDS}");

        loop {
            let mut request = self
                .http
                .get(format!("{}/drive/v3/files", self.api_base))
                .query(&[("q", q), ("fields", fields.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: FileList = self.send(request).await?.json().await?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(q, count = files.len(), "Drive query finished");
        Ok(files)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.auth.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        Err(GoogleError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/drive/v3/files/{}", self.api_base, urlencode_segment(file_id))
    }
}

/// Escape a value for a single-quoted string in a Drive `q` expression
pub fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    content: &[u8],
) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(&serde_json::to_vec(metadata)?);
    body.extend_from_slice(
        format!("\r\n--{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}
