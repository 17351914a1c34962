//! Core types and traits for text-generation calls

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error types that can occur during a model call
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Request timed out
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Rate limited by the provider
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Network error
    #[error("network error: {message}")]
    Network { message: String },

    /// Failed to parse response
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Invalid configuration or rejected request
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl BackendError {
    /// Create a timeout error
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Create a rate limit error
    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        Self::RateLimit { retry_after }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Response from a model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    /// Raw generated text
    pub text: String,

    /// Backend name that produced this response
    pub backend: String,

    /// Model used (if reported)
    pub model: Option<String>,

    /// Time taken
    pub duration: Duration,

    /// Token usage (if reported)
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl BackendResponse {
    /// Create a new response with just text
    pub fn new(text: String, backend: String, duration: Duration) -> Self {
        Self {
            text,
            backend,
            model: None,
            duration,
            usage: None,
        }
    }

    /// Add model info to the response
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add usage info to the response
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Request to a text-generation backend
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// The prompt to send
    pub prompt: String,

    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl BackendRequest {
    /// Create a simple request with just a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            timeout: None,
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fallible text-in, text-out model call
#[async_trait]
pub trait BackendExecutor: Send + Sync {
    /// Execute a request against this backend
    async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;

    /// Get the backend name
    fn name(&self) -> &str;

    /// Check if this backend is reachable
    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl BackendExecutor for Box<dyn BackendExecutor> {
    async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        (**self).execute(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn is_available(&self) -> bool {
        (**self).is_available().await
    }
}
