//! Text-generation backends
//!
//! The profile synthesizer talks to a model through the [`BackendExecutor`]
//! trait. The production implementation is an OpenAI-compatible HTTP client;
//! tests substitute their own executors.
//!
//! # Example
//!
//! ```ignore
//! use skillmine::backend_executor::{create_executor, BackendRequest};
//!
//! let backend = create_executor(&config.backend)?;
//! let response = backend.execute(&BackendRequest::new("Say hello")).await?;
//! println!("Output: {}", response.text);
//! ```

mod http_backend;
#[cfg(test)]
pub(crate) mod mock;
mod output_parser;
mod types;

pub use http_backend::HttpBackend;
pub use output_parser::extract_json_object;
#[allow(unused_imports)]
pub use types::{BackendError, BackendExecutor, BackendRequest, BackendResponse, TokenUsage};

use crate::config::BackendConfig;

/// Create the executor described by the backend config
pub fn create_executor(config: &BackendConfig) -> Result<Box<dyn BackendExecutor>, BackendError> {
    if !config.is_http() {
        return Err(BackendError::config(format!(
            "unsupported backend URL '{}'",
            config.base_url
        )));
    }
    Ok(Box::new(HttpBackend::from_config(
        backend_name(&config.base_url),
        config,
    )?))
}

/// Short display name for a backend URL (its host)
fn backend_name(base_url: &str) -> String {
    base_url
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split(['/', ':']).next())
        .filter(|host| !host.is_empty())
        .unwrap_or(base_url)
        .to_string()
}
