//! `SynologyNAS` tool server

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{input_schema, parse_args};
use crate::domain::errors::ToolError;
use crate::domain::models::ToolInfo;
use crate::domain::ports::ToolProvider;
use crate::infrastructure::synology::error::NOT_CONNECTED;
use crate::infrastructure::synology::{CopyOutcome, FileStationClient};

fn share_root() -> String {
    "/".to_string()
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ListArgs {
    /// Folder on the NAS; `/` lists the shared folders
    #[serde(default = "share_root")]
    path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct PathArgs {
    /// Absolute NAS path, starting with a shared folder
    path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct RenameArgs {
    path: String,
    new_name: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct CopyArgs {
    /// File or folder to copy
    src: String,
    /// Destination folder
    dest: String,
}

/// NAS tools. Without a client every call reports the NAS as not connected.
pub struct SynologyTools {
    client: Option<Arc<FileStationClient>>,
}

impl SynologyTools {
    pub fn new(client: Option<Arc<FileStationClient>>) -> Self {
        Self { client }
    }

    fn client(&self) -> Result<&FileStationClient, ToolError> {
        self.client
            .as_deref()
            .ok_or_else(|| ToolError::NotConnected(NOT_CONNECTED.to_string()))
    }
}

#[async_trait]
impl ToolProvider for SynologyTools {
    fn server_name(&self) -> &str {
        "SynologyNAS"
    }

    fn tools(&self) -> Vec<ToolInfo> {
        vec![
            ToolInfo::new(
                "list_directory",
                "List a NAS folder; `/` lists the shared folders.",
                input_schema::<ListArgs>(),
            ),
            ToolInfo::new(
                "delete_file",
                "Delete a file or folder on the NAS.",
                input_schema::<PathArgs>(),
            ),
            ToolInfo::new(
                "rename_file",
                "Rename a file or folder on the NAS.",
                input_schema::<RenameArgs>(),
            ),
            ToolInfo::new(
                "copy_file",
                "Copy a file or folder into another NAS folder.",
                input_schema::<CopyArgs>(),
            ),
        ]
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value, ToolError> {
        match tool {
            "list_directory" => {
                let args: ListArgs = parse_args(arguments)?;
                Ok(json!(self.client()?.list(&args.path).await?))
            }
            "delete_file" => {
                let args: PathArgs = parse_args(arguments)?;
                self.client()?.delete(&args.path).await?;
                Ok(json!("deleted"))
            }
            "rename_file" => {
                let args: RenameArgs = parse_args(arguments)?;
                self.client()?.rename(&args.path, &args.new_name).await?;
                Ok(json!("renamed"))
            }
            "copy_file" => {
                let args: CopyArgs = parse_args(arguments)?;
                match self.client()?.copy(&args.src, &args.dest).await? {
                    CopyOutcome::Finished => Ok(json!("copied")),
                    CopyOutcome::Running(task_id) => Ok(json!(format!("copy started, task {task_id}"))),
                }
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unconnected_nas_reports_message() {
        let tools = SynologyTools::new(None);

        let err = tools.call("list_directory", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "NAS not connected; fix credentials.");
    }

    #[tokio::test]
    async fn test_bad_arguments_checked_before_connection() {
        let tools = SynologyTools::new(None);

        let err = tools.call("rename_file", json!({"path": "/a"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_rename_through_client() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/webapi/auth.cgi")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"success": true, "data": {"sid": "s"}}"#)
            .create_async()
            .await;
        let rename = server
            .mock("GET", "/webapi/entry.cgi")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("method".into(), "rename".into()),
                mockito::Matcher::UrlEncoded("name".into(), "b.txt".into()),
            ]))
            .with_body(r#"{"success": true, "data": {}}"#)
            .create_async()
            .await;

        let client =
            FileStationClient::with_base_url(&server.url(), "u", "p", false, Duration::from_secs(5))
                .unwrap();
        let tools = SynologyTools::new(Some(Arc::new(client)));

        let result = tools
            .call("rename_file", json!({"path": "/home/a.txt", "new_name": "b.txt"}))
            .await
            .unwrap();
        assert_eq!(result, json!("renamed"));
        rename.assert_async().await;
    }

    #[tokio::test]
    async fn test_long_copy_reports_started_task() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/webapi/auth.cgi")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"success": true, "data": {"sid": "s"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/webapi/entry.cgi")
            .match_query(mockito::Matcher::UrlEncoded("method".into(), "start".into()))
            .with_body(r#"{"success": true, "data": {"taskid": "FileStation_7"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/webapi/entry.cgi")
            .match_query(mockito::Matcher::UrlEncoded("method".into(), "status".into()))
            .with_body(r#"{"success": true, "data": {"finished": false, "progress": 0.1}}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let client =
            FileStationClient::with_base_url(&server.url(), "u", "p", false, Duration::from_secs(5))
                .unwrap()
                .with_polling(Duration::from_millis(5), Duration::from_millis(50));
        let tools = SynologyTools::new(Some(Arc::new(client)));

        let result = tools
            .call("copy_file", json!({"src": "/home/big.iso", "dest": "/backup"}))
            .await
            .unwrap();
        assert_eq!(result, json!("copy started, task FileStation_7"));
    }
}
