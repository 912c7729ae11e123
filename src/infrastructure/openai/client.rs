use super::errors::OpenAiError;
use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;
use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Response, StatusCode, header};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::{ChatMessage, Config, ToolDefinition};
use crate::domain::ports::{ChatClient, ChatError};

/// Configuration for the OpenAI HTTP client
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    /// OpenAI API key
    pub api_key: String,

    /// Base URL for the API
    pub base_url: String,

    /// Model used for completions
    pub model: String,

    /// Rate limit in requests per second
    pub rate_limit_rps: f64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAiClientConfig {
    /// Client settings from the loaded configuration
    pub fn from_config(config: &Config, api_key: String) -> Self {
        Self {
            api_key,
            base_url: config.openai.base_url.clone(),
            model: config.openai.model.clone(),
            rate_limit_rps: config.rate_limit.requests_per_second,
            max_retries: config.retry.max_retries,
            initial_backoff_ms: config.retry.initial_backoff_ms,
            max_backoff_ms: config.retry.max_backoff_ms,
            timeout_secs: config.openai.timeout_secs,
        }
    }
}

/// HTTP client for the OpenAI Chat Completions API
///
/// Provides:
/// - Connection pooling and reuse
/// - Rate limiting via token bucket algorithm
/// - Exponential backoff retry logic
/// - Status code classification into [`OpenAiError`]
pub struct OpenAiClient {
    http_client: ReqwestClient,
    base_url: String,
    model: String,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, OpenAiError> {
        info!(
            base_url = %config.base_url,
            model = %config.model,
            rate_limit_rps = config.rate_limit_rps,
            timeout_secs = config.timeout_secs,
            "Initializing OpenAI client"
        );

        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| OpenAiError::InvalidRequest(format!("Invalid API key: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()
            .map_err(OpenAiError::NetworkError)?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
            rate_limiter: TokenBucketRateLimiter::new(config.rate_limit_rps),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    /// Request the next assistant message for a history
    #[instrument(skip(self, messages, tools), fields(model = %self.model, messages = messages.len(), tools = tools.len()))]
    pub async fn create_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        let request = ChatCompletionRequest::new(&self.model, messages, tools);

        let result = self
            .retry_policy
            .execute(|| async {
                self.rate_limiter.acquire().await;
                self.execute_request(&request).await
            })
            .await;

        match &result {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Completion succeeded"
                    );
                }
            }
            Err(err) => error!("Completion request failed: {}", err),
        }

        result
    }

    /// Execute a single request (called by retry logic)
    async fn execute_request(
        &self,
        request: &ChatCompletionRequest<'_>,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(OpenAiError::from_transport)?;

        self.handle_response(response).await
    }

    async fn handle_response(
        &self,
        response: Response,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let body = response.text().await.map_err(OpenAiError::from_transport)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Handle error response and classify error type
    async fn handle_error_response(&self, response: Response) -> OpenAiError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());

        warn!("API error ({}): {}", status, body);

        match status {
            StatusCode::BAD_REQUEST => OpenAiError::InvalidRequest(body),
            StatusCode::UNAUTHORIZED => OpenAiError::InvalidApiKey,
            StatusCode::FORBIDDEN => OpenAiError::Forbidden(body),
            StatusCode::NOT_FOUND => OpenAiError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => OpenAiError::RateLimitExceeded,
            status if status.is_server_error() => OpenAiError::ServerError(status, body),
            _ => OpenAiError::UnknownError(status, body),
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, ChatError> {
        let response = self.create_completion(messages, tools).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(OpenAiError::EmptyResponse)?;

        debug!(finish_reason = ?choice.finish_reason, tool_calls = choice.message.tool_calls.len(), "Model replied");
        Ok(choice.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_loaded_config() {
        let mut config = Config::default();
        config.openai.model = "gpt-4o-mini".to_string();
        config.retry.max_retries = 5;

        let client_config = OpenAiClientConfig::from_config(&config, "sk-test".to_string());
        assert_eq!(client_config.model, "gpt-4o-mini");
        assert_eq!(client_config.base_url, "https://api.openai.com");
        assert_eq!(client_config.max_retries, 5);
        assert_eq!(client_config.timeout_secs, 120);
    }

    #[test]
    fn test_rejects_unprintable_api_key() {
        let mut client_config =
            OpenAiClientConfig::from_config(&Config::default(), "sk-test\n".to_string());
        assert!(OpenAiClient::new(client_config.clone()).is_err());

        client_config.api_key = "sk-test".to_string();
        assert!(OpenAiClient::new(client_config).is_ok());
    }
}
