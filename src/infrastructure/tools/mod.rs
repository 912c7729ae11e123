//! Tool providers served by `fsassist serve <kind>`
//!
//! Each provider implements [`ToolProvider`](crate::domain::ports::ToolProvider)
//! and is exposed over stdio by [`McpServer`](crate::infrastructure::mcp::McpServer).

pub mod fs_ops;
pub mod gdrive;
pub mod icloud;
pub mod local_fs;
pub mod paths;
pub mod synology;

pub use gdrive::GoogleDriveTools;
pub use icloud::ICloudTools;
pub use local_fs::LocalFsTools;
pub use paths::PathJail;
pub use synology::SynologyTools;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::domain::errors::ToolError;

/// JSON schema for a tool's argument struct, without the draft and title
/// keys that function-calling APIs do not expect.
pub(crate) fn input_schema<T: JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    let mut schema = serde_json::to_value(root).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

/// Decode tool arguments into their struct
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(arguments)?)
}
