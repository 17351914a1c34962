//! Backend configuration for the text-generation provider

use serde::{Deserialize, Serialize};

/// Configuration for the OpenAI-compatible model endpoint
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model ID to request
    #[serde(default = "default_model")]
    pub model: String,

    /// API key given inline. Prefer `api_key_env`.
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout in seconds for a single model call
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

fn default_model() -> String {
    "kwaipilot/kat-coder-pro:free".into()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout: default_timeout(),
            temperature: 0.0,
        }
    }
}

impl BackendConfig {
    /// Resolve the API key: inline value first, then the configured env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| lookup(&self.api_key_env))
            .filter(|k| !k.trim().is_empty())
    }

    /// Returns true if the base URL looks like an HTTP endpoint
    pub fn is_http(&self) -> bool {
        self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
    }
}

/// Mask a secret for display: 5-character prefix plus length.
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    format!("{}... ({} chars)", prefix, key.chars().count())
}
