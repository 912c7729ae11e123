//! `GoogleDrive` tool server

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{input_schema, parse_args};
use crate::domain::errors::ToolError;
use crate::domain::models::config::expand_home;
use crate::domain::models::{Config, ToolInfo};
use crate::domain::ports::ToolProvider;
use crate::infrastructure::google::{ClientSecrets, DriveClient, GoogleAuth, GoogleError};

fn root_folder() -> String {
    "root".to_string()
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ListArgs {
    /// Folder id; `root` is My Drive
    #[serde(default = "root_folder")]
    folder_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SearchArgs {
    /// Text the file name must contain
    query: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct RenameArgs {
    file_id: String,
    new_name: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct FileIdArgs {
    file_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct UploadArgs {
    /// Path of the local file to upload
    local_path: String,
    /// Folder id to upload into
    #[serde(default = "root_folder")]
    dest_folder_id: String,
}

/// Drive tools backed by [`DriveClient`]
pub struct GoogleDriveTools {
    drive: Arc<DriveClient>,
}

impl GoogleDriveTools {
    pub fn new(drive: Arc<DriveClient>) -> Self {
        Self { drive }
    }

    /// Build the client from the configured secrets and token cache.
    /// Downloads land in the data directory.
    pub async fn from_config(config: &Config) -> Result<Self, GoogleError> {
        let secrets_path = config.google.client_secret_json.as_deref().ok_or_else(|| {
            GoogleError::InvalidSecrets("GOOGLE_CLIENT_SECRET_JSON is not set".to_string())
        })?;
        let secrets = ClientSecrets::load(&expand_home(secrets_path)).await?;
        let auth = Arc::new(GoogleAuth::new(secrets, config.gdrive_token_path())?);
        let drive = DriveClient::new(auth, config.data_dir())?;
        Ok(Self::new(Arc::new(drive)))
    }
}

#[async_trait]
impl ToolProvider for GoogleDriveTools {
    fn server_name(&self) -> &str {
        "GoogleDrive"
    }

    fn instructions(&self) -> Option<String> {
        Some("Files are addressed by id; list or search first to find ids.".to_string())
    }

    fn tools(&self) -> Vec<ToolInfo> {
        vec![
            ToolInfo::new(
                "list_files",
                "List name, id and mimeType of the files in a folder.",
                input_schema::<ListArgs>(),
            ),
            ToolInfo::new(
                "search_files",
                "Find files whose name contains the query.",
                input_schema::<SearchArgs>(),
            ),
            ToolInfo::new("rename_file", "Rename a file.", input_schema::<RenameArgs>()),
            ToolInfo::new("delete_file", "Delete a file.", input_schema::<FileIdArgs>()),
            ToolInfo::new(
                "download_file",
                "Download a file; returns the local path.",
                input_schema::<FileIdArgs>(),
            ),
            ToolInfo::new(
                "upload_file",
                "Upload a local file into a folder.",
                input_schema::<UploadArgs>(),
            ),
        ]
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value, ToolError> {
        match tool {
            "list_files" => {
                let args: ListArgs = parse_args(arguments)?;
                Ok(json!(self.drive.list_files(&args.folder_id).await?))
            }
            "search_files" => {
                let args: SearchArgs = parse_args(arguments)?;
                Ok(json!(self.drive.search_files(&args.query).await?))
            }
            "rename_file" => {
                let args: RenameArgs = parse_args(arguments)?;
                self.drive.rename_file(&args.file_id, &args.new_name).await?;
                Ok(json!("renamed"))
            }
            "delete_file" => {
                let args: FileIdArgs = parse_args(arguments)?;
                self.drive.delete_file(&args.file_id).await?;
                Ok(json!("deleted"))
            }
            "download_file" => {
                let args: FileIdArgs = parse_args(arguments)?;
                let path = self.drive.download_file(&args.file_id).await?;
                Ok(json!(path.display().to_string()))
            }
            "upload_file" => {
                let args: UploadArgs = parse_args(arguments)?;
                let local = expand_home(&args.local_path);
                if !local.is_file() {
                    return Err(ToolError::NotFound(format!(
                        "{} is not a file",
                        local.display()
                    )));
                }
                self.drive.upload_file(&local, &args.dest_folder_id).await?;
                Ok(json!("uploaded"))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::google::StoredToken;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn tools(server: &mockito::Server, dir: &TempDir) -> GoogleDriveTools {
        let token_path = dir.path().join("token.json");
        let token = StoredToken {
            access_token: "ya29.test".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scope: None,
        };
        tokio::fs::write(&token_path, serde_json::to_vec(&token).unwrap())
            .await
            .unwrap();
        let secrets =
            ClientSecrets::from_json(r#"{"installed": {"client_id": "c", "client_secret": "s"}}"#)
                .unwrap();
        let auth = Arc::new(GoogleAuth::new(secrets, token_path).unwrap());
        let drive = DriveClient::with_base_url(auth, dir.path(), &server.url()).unwrap();
        GoogleDriveTools::new(Arc::new(drive))
    }

    #[tokio::test]
    async fn test_list_defaults_to_root_folder() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(mockito::Matcher::UrlEncoded(
                "q".into(),
                "'root' in parents and trashed=false".into(),
            ))
            .with_body(r#"{"files": [{"id": "a", "name": "CV.pdf", "mimeType": "application/pdf"}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let listed = tools(&server, &dir).await.call("list_files", json!({})).await.unwrap();

        assert_eq!(
            listed,
            json!([{"id": "a", "name": "CV.pdf", "mimeType": "application/pdf"}])
        );
    }

    #[tokio::test]
    async fn test_delete_returns_confirmation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/drive/v3/files/a")
            .with_status(204)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let result = tools(&server, &dir)
            .await
            .call("delete_file", json!({"file_id": "a"}))
            .await
            .unwrap();
        assert_eq!(result, json!("deleted"));
    }

    #[tokio::test]
    async fn test_missing_file_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/drive/v3/files/gone")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": {"message": "File not found: gone."}}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let err = tools(&server, &dir)
            .await
            .call("rename_file", json!({"file_id": "gone", "new_name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_requires_existing_file() {
        let server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.txt");

        let err = tools(&server, &dir)
            .await
            .call("upload_file", json!({"local_path": missing.display().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn test_upload_schema_defaults() {
        let schema = input_schema::<UploadArgs>();
        assert_eq!(schema["required"], json!(["local_path"]));
        assert_eq!(schema["properties"]["dest_folder_id"]["default"], "root");
    }
}
