//! Scripted backend for tests

use super::types::{BackendError, BackendExecutor, BackendRequest, BackendResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend that replays scripted replies and records every prompt it sees
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<String, BackendError>>>,
    default_reply: Result<String, BackendError>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Always answer with `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Ok(text.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always fail with `error`
    pub fn failing(error: BackendError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Err(error),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a one-off reply ahead of the default
    pub fn then(self, reply: Result<String, BackendError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Shared handle on the prompts received so far
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl BackendExecutor for MockBackend {
    async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        reply.map(|text| BackendResponse::new(text, "mock".into(), Duration::from_millis(1)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
