use std::path::PathBuf;

use thiserror::Error;

use crate::domain::errors::ToolError;

/// Errors from Google OAuth and the Drive REST API
#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Client secrets file not found: {0}")]
    SecretsNotFound(PathBuf),

    #[error("Invalid client secrets: {0}")]
    InvalidSecrets(String),

    /// No usable token; the user has to run `fsassist auth gdrive`
    #[error("Google Drive is not authorized (run `fsassist auth gdrive`): {0}")]
    AuthorizationRequired(String),

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("OAuth state mismatch in redirect")]
    StateMismatch,

    #[error("Token endpoint rejected the request ({status}): {message}")]
    TokenRejected { status: u16, message: String },

    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GoogleError>;

impl From<GoogleError> for ToolError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::AuthorizationRequired(_)
            | GoogleError::AuthorizationDenied(_)
            | GoogleError::TokenRejected { .. } => ToolError::NotConnected(err.to_string()),
            GoogleError::Api { status: 404, .. } => ToolError::NotFound(err.to_string()),
            GoogleError::Io(e) => ToolError::from(e),
            other => ToolError::Remote(other.to_string()),
        }
    }
}
