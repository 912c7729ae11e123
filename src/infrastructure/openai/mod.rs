//! OpenAI Chat Completions client
//!
//! Rate limited, retried HTTP client implementing the [`ChatClient`] port.
//!
//! [`ChatClient`]: crate::domain::ports::ChatClient

pub mod client;
pub mod errors;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use client::{OpenAiClient, OpenAiClientConfig};
pub use errors::OpenAiError;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
pub use types::{ChatCompletionRequest, ChatCompletionResponse, Choice, Usage};
