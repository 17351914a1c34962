//! HTTP API-based backend executor

use super::types::{BackendError, BackendExecutor, BackendRequest, BackendResponse, TokenUsage};
use crate::config::BackendConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Executor for OpenAI-compatible chat completion APIs (OpenRouter, Ollama, vLLM, ...)
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Backend name, used in logs
    name: String,

    /// Base URL for the API
    base_url: String,

    /// API key (if required)
    api_key: Option<String>,

    /// Model ID to use
    model: String,

    /// Sampling temperature
    temperature: Option<f32>,

    /// Default timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::config(format!("failed to build HTTP client: {}", e)))
}

impl HttpBackend {
    /// Create a new HTTP backend from config, resolving the API key
    pub fn from_config(name: impl Into<String>, config: &BackendConfig) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(config.timeout);

        Ok(Self {
            name: name.into(),
            base_url: config.base_url.clone(),
            api_key: config.resolve_api_key(),
            model: config.model.clone(),
            temperature: Some(config.temperature),
            timeout,
            client: build_client(timeout)?,
        })
    }

    /// Build the chat completion URL
    fn chat_completion_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Map HTTP status to BackendError
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> BackendError {
        match status.as_u16() {
            401 | 403 => BackendError::auth(format!("HTTP {}: {}", status, body)),
            429 => BackendError::rate_limit(parse_retry_after(body)),
            408 | 504 => BackendError::timeout(self.timeout),
            400..=499 => BackendError::config(format!("HTTP {}: {}", status, body)),
            500..=599 => BackendError::network(format!("HTTP {}: {}", status, body)),
            _ => BackendError::network(format!("unexpected HTTP {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
impl HttpBackend {
    /// Create a new HTTP backend with explicit parameters
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(300);

        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: None,
            timeout,
            client: build_client(timeout)?,
        })
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Whether an API key will be sent
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Try to parse retry-after from an error body
fn parse_retry_after(body: &str) -> Option<Duration> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("retry_after")?
        .as_f64()
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl BackendExecutor for HttpBackend {
    async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let start = Instant::now();

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".into(),
                content: request.prompt.clone(),
            }],
            temperature: self.temperature,
        };

        let mut http_request = self.client.post(self.chat_completion_url()).json(&body);

        if let Some(ref key) = self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let timeout = request.timeout.unwrap_or(self.timeout);
        let result = tokio::time::timeout(timeout, http_request.send()).await;

        let elapsed = start.elapsed();

        match result {
            Ok(Ok(response)) => {
                let status = response.status();

                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(self.map_http_error(status, &body));
                }

                let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
                    BackendError::parse(format!("failed to parse response: {}", e))
                })?;

                let text = completion
                    .choices
                    .first()
                    .and_then(|c| c.message.content.clone())
                    .ok_or_else(|| BackendError::parse("response contained no message content"))?;

                let mut backend_response = BackendResponse::new(text, self.name.clone(), elapsed);

                if let Some(model) = completion.model {
                    backend_response = backend_response.with_model(model);
                }

                if let Some(usage) = completion.usage {
                    backend_response = backend_response.with_usage(TokenUsage {
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                        total_tokens: usage.total_tokens,
                    });
                }

                Ok(backend_response)
            }
            Ok(Err(e)) => {
                if e.is_timeout() {
                    Err(BackendError::timeout(elapsed))
                } else if e.is_connect() {
                    Err(BackendError::network(format!("connection failed: {}", e)))
                } else {
                    Err(BackendError::network(format!("request failed: {}", e)))
                }
            }
            Err(_) => Err(BackendError::timeout(elapsed)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        match tokio::time::timeout(Duration::from_secs(5), request.send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_backend_builder() {
        let backend = HttpBackend::new("openrouter", "https://openrouter.ai/api/v1", "kat")
            .unwrap()
            .with_api_key("sk-test")
            .with_temperature(0.0);

        assert_eq!(backend.name, "openrouter");
        assert_eq!(backend.model, "kat");
        assert_eq!(backend.api_key, Some("sk-test".into()));
        assert_eq!(backend.temperature, Some(0.0));
        assert!(backend.has_api_key());
    }

    #[test]
    fn test_chat_completion_url() {
        let backend = HttpBackend::new("test", "https://api.example.com/v1", "m").unwrap();
        assert_eq!(
            backend.chat_completion_url(),
            "https://api.example.com/v1/chat/completions"
        );

        let backend = HttpBackend::new("test", "https://api.example.com/v1/", "m").unwrap();
        assert_eq!(
            backend.chat_completion_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_map_http_error() {
        let backend = HttpBackend::new("test", "https://example.com", "m").unwrap();

        let err = backend.map_http_error(reqwest::StatusCode::UNAUTHORIZED, "bad token");
        assert!(matches!(err, BackendError::Auth { .. }));

        let err = backend.map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"retry_after": 2.5}"#,
        );
        match err {
            BackendError::RateLimit { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_millis(2500)))
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        let err = backend.map_http_error(reqwest::StatusCode::BAD_REQUEST, "no such model");
        assert!(matches!(err, BackendError::Config { .. }));

        let err = backend.map_http_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "error");
        assert!(matches!(err, BackendError::Network { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = BackendConfig {
            base_url: "http://localhost:11434/v1".into(),
            api_key: Some("sk-test".into()),
            model: "qwen3-coder".into(),
            timeout: 120,
            ..Default::default()
        };

        let backend = HttpBackend::from_config("local", &config).unwrap();
        assert_eq!(backend.name, "local");
        assert_eq!(backend.base_url, "http://localhost:11434/v1");
        assert_eq!(backend.api_key, Some("sk-test".into()));
        assert_eq!(backend.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_execute_against_mock_server() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "kat",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-1",
                "model": "kat",
                "choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new("mock", server.uri(), "kat")
            .unwrap()
            .with_api_key("sk-test");

        let response = backend
            .execute(&BackendRequest::new("hello"))
            .await
            .unwrap();

        assert_eq!(response.text, "{\"ok\": true}");
        assert_eq!(response.model, Some("kat".into()));
        assert_eq!(response.usage.unwrap().total_tokens, Some(16));
    }

    #[tokio::test]
    async fn test_execute_maps_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new("mock", server.uri(), "kat").unwrap();
        let err = backend
            .execute(&BackendRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_choices() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new("mock", server.uri(), "kat").unwrap();
        let err = backend
            .execute(&BackendRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_is_available() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let backend = HttpBackend::new("mock", server.uri(), "kat").unwrap();
        assert!(backend.is_available().await);

        let unreachable = HttpBackend::new("none", "http://127.0.0.1:9", "kat").unwrap();
        assert!(!unreachable.is_available().await);
    }
}
