//! `LocalFS` tool server: file management inside the user's home directory.

use std::path::{Path, PathBuf};

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

fn home() -> String {
    "~".to_string()
}

fn all() -> String {
    "all".to_string()
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ListFilesArgs {
    /// Directory to list; `~` is the home directory
    #[serde(default = "home")]
    directory: String,
    /// `all` for every entry, `files` for regular files only
    #[serde(default = "all")]
    file_type: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ListDirArgs {
    /// Directory to list
    #[serde(default = "home")]
    path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct FolderFilesArgs {
    /// Directory to list
    #[serde(default = "home")]
    folder: String,
    /// `all` for every entry, `files` for regular files only
    #[serde(default = "all")]
    file_type: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SearchArgs {
    /// Part of the file name; glob characters are allowed
    query: String,
    /// Directory to search recursively
    #[serde(default = "home")]
    path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct RenameArgs {
    /// File or directory to rename
    old_path: String,
    /// New name, without any directory part
    new_name: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct TransferArgs {
    /// Source path
    src: String,
    /// Destination path or existing directory
    dest: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct DeleteArgs {
    /// File or directory to delete
    path: String,
}

/// Local filesystem tools confined to one root directory
#[derive(Debug, Clone)]
pub struct LocalFsTools {
    jail: PathJail,
    search_limit: usize,
}

impl LocalFsTools {
    pub fn new(root: impl Into<PathBuf>, search_limit: usize) -> Self {
        Self {
            jail: PathJail::new(root, "path outside home directory").with_home_alias(),
            search_limit,
        }
    }

    pub fn root(&self) -> &Path {
        self.jail.root()
    }

    /// Entry names of `directory`; a missing directory yields an empty list
    pub fn list_files(&self, directory: &str, file_type: &str) -> Result<Vec<String>, ToolError> {
        let base = self.jail.resolve(directory)?;
        let files_only = file_type.eq_ignore_ascii_case("files");

        match fs_ops::list_names(&base, files_only) {
            Ok(names) => Ok(names),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    pub fn search_files(&self, query: &str, path: &str) -> Result<Vec<String>, ToolError> {
        let base = self.jail.resolve(path)?;
        Ok(fs_ops::search(&base, query, self.search_limit)
            .into_iter()
            .map(|p| p.display().to_string())
            .collect())
    }

    pub fn rename_file(&self, old_path: &str, new_name: &str) -> Result<String, ToolError> {
        if new_name.is_empty()
            || Path::new(new_name).file_name().and_then(|n| n.to_str()) != Some(new_name)
        {
            return Err(ToolError::InvalidArguments(format!(
                "new_name must be a plain file name, got '{new_name}'"
            )));
        }

        let src = self.jail.resolve(old_path)?;
        self.guard_root(&src)?;
        let dest = src.with_file_name(new_name);
        std::fs::rename(&src, &dest)?;

        info!(from = %src.display(), to = %dest.display(), "Renamed");
        Ok(format!("renamed to {}", dest.display()))
    }

    pub fn move_file(&self, src: &str, dest: &str) -> Result<String, ToolError> {
        let src = self.jail.resolve(src)?;
        let dest = self.jail.resolve(dest)?;
        self.guard_root(&src)?;

        let target = fs_ops::move_path(&src, &dest)?;
        info!(from = %src.display(), to = %target.display(), "Moved");
        Ok("moved".to_string())
    }

    pub fn copy_file(&self, src: &str, dest: &str) -> Result<String, ToolError> {
        let src = self.jail.resolve(src)?;
        let dest = self.jail.resolve(dest)?;

        let target = fs_ops::copy_path(&src, &dest)?;
        info!(from = %src.display(), to = %target.display(), "Copied");
        Ok("copied".to_string())
    }

    pub fn delete_file(&self, path: &str) -> Result<String, ToolError> {
        let target = self.jail.resolve(path)?;
        self.guard_root(&target)?;

        fs_ops::remove_path(&target)?;
        info!(path = %target.display(), "Deleted");
        Ok("deleted".to_string())
    }

    fn guard_root(&self, path: &Path) -> Result<(), ToolError> {
        if self.jail.is_root(path) {
            return Err(ToolError::InvalidArguments(
                "the home directory itself cannot be modified".to_string(),
            ));
        }
        Ok(())
    }

    fn dispatch(&self, tool: &str, arguments: Value) -> Result<Value, ToolError> {
        match tool {
            "list_files" => {
                let args: ListFilesArgs = parse_args(arguments)?;
                Ok(json!(self.list_files(&args.directory, &args.file_type)?))
            }
            "listdir" => {
                let args: ListDirArgs = parse_args(arguments)?;
                Ok(json!(self.list_files(&args.path, "all")?))
            }
            "folder_files" => {
                let args: FolderFilesArgs = parse_args(arguments)?;
                Ok(json!(self.list_files(&args.folder, &args.file_type)?))
            }
            "search_files" => {
                let args: SearchArgs = parse_args(arguments)?;
                Ok(json!(self.search_files(&args.query, &args.path)?))
            }
            "rename_file" => {
                let args: RenameArgs = parse_args(arguments)?;
                Ok(Value::String(self.rename_file(&args.old_path, &args.new_name)?))
            }
            "move_file" => {
                let args: TransferArgs = parse_args(arguments)?;
                Ok(Value::String(self.move_file(&args.src, &args.dest)?))
            }
            "copy_file" => {
                let args: TransferArgs = parse_args(arguments)?;
                Ok(Value::String(self.copy_file(&args.src, &args.dest)?))
            }
            "delete_file" => {
                let args: DeleteArgs = parse_args(arguments)?;
                Ok(Value::String(self.delete_file(&args.path)?))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[async_trait]
impl ToolProvider for LocalFsTools {
    fn server_name(&self) -> &str {
        "LocalFS"
    }

    fn instructions(&self) -> Option<String> {
        Some(format!(
            "Manage files under {}. `~` and relative paths refer to that directory.",
            self.root().display()
        ))
    }

    fn tools(&self) -> Vec<ToolInfo> {
        vec![
            ToolInfo::new(
                "list_files",
                "List directory contents. If file_type=='files' return only files.",
                input_schema::<ListFilesArgs>(),
            ),
            ToolInfo::new("listdir", "Alias of list_files", input_schema::<ListDirArgs>()),
            ToolInfo::new(
                "folder_files",
                "Alias of list_files",
                input_schema::<FolderFilesArgs>(),
            ),
            ToolInfo::new(
                "search_files",
                "Recursively search by file name glob.",
                input_schema::<SearchArgs>(),
            ),
            ToolInfo::new(
                "rename_file",
                "Rename a file or directory in place.",
                input_schema::<RenameArgs>(),
            ),
            ToolInfo::new(
                "move_file",
                "Move a file or directory.",
                input_schema::<TransferArgs>(),
            ),
            ToolInfo::new(
                "copy_file",
                "Copy a file or directory.",
                input_schema::<TransferArgs>(),
            ),
            ToolInfo::new(
                "delete_file",
                "Delete a file, or a directory with everything in it.",
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
