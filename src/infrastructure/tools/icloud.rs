//! `iCloudDrive` tool server over the locally synced iCloud Drive folder.

use std::path::PathBuf;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::paths::PathJail;
use super::{fs_ops, input_schema, parse_args};
use crate::domain::errors::ToolError;
use crate::domain::models::ToolInfo;
use crate::domain::ports::ToolProvider;

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ListArgs {
    /// Folder relative to the iCloud Drive root
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SearchArgs {
    /// Part of the file name; glob characters are allowed
    query: String,
    /// Folder relative to the iCloud Drive root
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct CopyArgs {
    /// Source, relative to the iCloud Drive root
    src_rel: String,
    /// Destination file or folder, relative to the iCloud Drive root
    dest_rel: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct DeleteArgs {
    /// File relative to the iCloud Drive root
    rel_path: String,
}

/// Tools over the iCloud Drive folder; every path is relative to its root
#[derive(Debug, Clone)]
pub struct ICloudTools {
    jail: PathJail,
    search_limit: usize,
}

impl ICloudTools {
    pub fn new(root: impl Into<PathBuf>, search_limit: usize) -> Self {
        Self {
            jail: PathJail::new(root, "path outside iCloud"),
            search_limit,
        }
    }

    pub fn list_files(&self, path: &str) -> Result<Vec<String>, ToolError> {
        let dir = self.jail.resolve(path)?;
        Ok(fs_ops::list_names(&dir, false)?)
    }

    pub fn search_files(&self, query: &str, path: &str) -> Result<Vec<String>, ToolError> {
        let base = self.jail.resolve(path)?;
        Ok(fs_ops::search(&base, query, self.search_limit)
            .into_iter()
            .map(|p| p.display().to_string())
            .collect())
    }

    pub fn copy_file(&self, src_rel: &str, dest_rel: &str) -> Result<String, ToolError> {
        let src = self.jail.resolve(src_rel)?;
        let dest = self.jail.resolve(dest_rel)?;

        let target = fs_ops::copy_path(&src, &dest)?;
        info!(from = %src.display(), to = %target.display(), "Copied in iCloud Drive");
        Ok("copied".to_string())
    }

    /// Delete a single file. Folders are refused.
    pub fn delete_file(&self, rel_path: &str) -> Result<String, ToolError> {
        let target = self.jail.resolve(rel_path)?;
        if target.is_dir() {
            return Err(ToolError::InvalidArguments(format!(
                "'{rel_path}' is a folder; only files can be deleted"
            )));
        }

        std::fs::remove_file(&target)?;
        info!(path = %target.display(), "Deleted from iCloud Drive");
        Ok("deleted".to_string())
    }

    fn dispatch(&self, tool: &str, arguments: Value) -> Result<Value, ToolError> {
        match tool {
            "list_files" => {
                let args: ListArgs = parse_args(arguments)?;
                Ok(json!(self.list_files(&args.path)?))
            }
            "search_files" => {
                let args: SearchArgs = parse_args(arguments)?;
                Ok(json!(self.search_files(&args.query, &args.path)?))
            }
            "copy_file" => {
                let args: CopyArgs = parse_args(arguments)?;
                Ok(Value::String(self.copy_file(&args.src_rel, &args.dest_rel)?))
            }
            "delete_file" => {
                let args: DeleteArgs = parse_args(arguments)?;
                Ok(Value::String(self.delete_file(&args.rel_path)?))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[async_trait]
impl ToolProvider for ICloudTools {
    fn server_name(&self) -> &str {
        "iCloudDrive"
    }

    fn instructions(&self) -> Option<String> {
        Some("Paths are relative to the iCloud Drive folder; \"\" is its top level.".to_string())
    }

    fn tools(&self) -> Vec<ToolInfo> {
        vec![
            ToolInfo::new("list_files", "List an iCloud Drive folder.", input_schema::<ListArgs>()),
            ToolInfo::new(
                "search_files",
                "Recursively search iCloud Drive by file name glob.",
                input_schema::<SearchArgs>(),
            ),
            ToolInfo::new(
                "copy_file",
                "Copy a file within iCloud Drive.",
                input_schema::<CopyArgs>(),
            ),
            ToolInfo::new(
                "delete_file",
                "Delete a file from iCloud Drive.",
                input_schema::<DeleteArgs>(),
            ),
        ]
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value, ToolError> {
        let this = self.clone();
        let tool = tool.to_string();
        tokio::task::spawn_blocking(move || this.dispatch(&tool, arguments))
            .await
            .map_err(|e| ToolError::Io(format!("tool task failed: {e}")))?
    }
}
