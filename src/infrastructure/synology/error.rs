use thiserror::Error;

use crate::domain::errors::ToolError;

/// Message returned to the model when the NAS is unusable
pub const NOT_CONNECTED: &str = "NAS not connected; fix credentials.";

/// Errors from the FileStation Web API
#[derive(Error, Debug)]
pub enum SynologyError {
    #[error("NAS is not configured (set NAS_HOST, NAS_USER and NAS_PASS)")]
    NotConfigured,

    #[error("Login failed ({code}): {message}")]
    Login { code: i64, message: String },

    #[error("FileStation error ({code}): {message}")]
    Api { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynologyError>;

impl SynologyError {
    /// Error code returned when the session id is no longer valid
    pub fn is_session_error(code: i64) -> bool {
        matches!(code, 105 | 106 | 107 | 119)
    }

    pub(crate) fn login(code: i64) -> Self {
        let message = match code {
            400 => "no such account or incorrect password",
            401 => "account disabled",
            402 => "permission denied",
            403 => "2-step verification code required",
            404 => "failed to authenticate 2-step verification code",
            _ => "authentication failed",
        };
        Self::Login {
            code,
            message: message.to_string(),
        }
    }

    pub(crate) fn api(code: i64) -> Self {
        let message = match code {
            100 => "unknown error",
            101 => "missing or invalid parameter",
            102 => "requested API does not exist",
            103 => "requested method does not exist",
            104 => "requested version is not supported",
            105 => "insufficient user privilege",
            106 => "session timeout",
            107 => "session interrupted by duplicate login",
            119 => "session id not found",
            400 => "invalid parameter of file operation",
            401 => "unknown error of file operation",
            402 => "system is too busy",
            403 => "invalid user for this file operation",
            404 => "invalid group for this file operation",
            405 => "invalid user and group for this file operation",
            406 => "cannot get user/group information from the account server",
            407 => "operation not permitted",
            408 => "no such file or directory",
            409 => "non-supported file system",
            410 => "failed to connect internet-based file system",
            411 => "read-only file system",
            412 => "filename too long in the non-encrypted file system",
            413 => "filename too long in the encrypted file system",
            414 => "file already exists",
            415 => "disk quota exceeded",
            416 => "no space left on device",
            417 => "input/output error",
            418 => "illegal name or path",
            419 => "illegal file name",
            420 => "illegal file name on FAT file system",
            421 => "device or resource busy",
            599 => "no such task of the file operation",
            1100 | 1101 => "failed to create a folder",
            1200 => "failed to rename it",
            _ => "request failed",
        };
        Self::Api {
            code,
            message: message.to_string(),
        }
    }
}

impl From<SynologyError> for ToolError {
    fn from(err: SynologyError) -> Self {
        match err {
            SynologyError::NotConfigured | SynologyError::Login { .. } => {
                ToolError::NotConnected(NOT_CONNECTED.to_string())
            }
            SynologyError::Api { code: 408, .. } => ToolError::NotFound(err.to_string()),
            SynologyError::Api { code: 414, .. } | SynologyError::Api { code: 418..=420, .. } => {
                ToolError::InvalidArguments(err.to_string())
            }
            other => ToolError::Remote(other.to_string()),
        }
    }
}
