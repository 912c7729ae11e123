use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::ports::ChatError;

/// Errors that can occur when interacting with the OpenAI API
#[derive(Error, Debug)]
pub enum OpenAiError {
    /// Invalid request parameters (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing API key (HTTP 401)
    #[error("Invalid API key - authentication failed")]
    InvalidApiKey,

    /// Forbidden - permission denied (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Model or endpoint not found (HTTP 404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// Server error from the API (HTTP 5xx)
    #[error("Server error ({0}): {1}")]
    ServerError(StatusCode, String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// The response carried no choices
    #[error("Response contained no choices")]
    EmptyResponse,

    /// Unknown or unexpected error
    #[error("Unknown error ({0}): {1}")]
    UnknownError(StatusCode, String),
}

impl OpenAiError {
    /// Classify a transport error, separating timeouts from other failures
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }

    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError(_, _) | Self::Timeout | Self::NetworkError(_)
        )
    }

    /// Returns true if this is a permanent error that should not be retried
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::InvalidApiKey | Self::Forbidden(_) | Self::NotFound(_)
        )
    }
}

impl From<OpenAiError> for ChatError {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::InvalidApiKey | OpenAiError::Forbidden(_) => {
                Self::Authentication(err.to_string())
            }
            OpenAiError::EmptyResponse => Self::EmptyResponse,
            err if err.is_transient() => Self::Unavailable(err.to_string()),
            err => Self::InvalidRequest(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(OpenAiError::RateLimitExceeded.is_transient());
        assert!(
            OpenAiError::ServerError(StatusCode::BAD_GATEWAY, "test".to_string()).is_transient()
        );
        assert!(OpenAiError::Timeout.is_transient());
        assert!(!OpenAiError::EmptyResponse.is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(OpenAiError::InvalidRequest("test".to_string()).is_permanent());
        assert!(OpenAiError::InvalidApiKey.is_permanent());
        assert!(OpenAiError::Forbidden("test".to_string()).is_permanent());
        assert!(OpenAiError::NotFound("gpt-9".to_string()).is_permanent());
    }

    #[test]
    fn test_chat_error_mapping() {
        assert!(matches!(
            ChatError::from(OpenAiError::InvalidApiKey),
            ChatError::Authentication(_)
        ));
        assert!(matches!(
            ChatError::from(OpenAiError::RateLimitExceeded),
            ChatError::Unavailable(_)
        ));
        assert!(matches!(
            ChatError::from(OpenAiError::InvalidRequest("bad".to_string())),
            ChatError::InvalidRequest(_)
        ));
        assert!(matches!(
            ChatError::from(OpenAiError::EmptyResponse),
            ChatError::EmptyResponse
        ));
    }
}
