//! Turn one author's commit messages into a validated skill profile

use super::model::{AuthorProfile, parse_profile};
use super::prompt::{DEFAULT_PROMPT_TEMPLATE, build_commit_blob, render_prompt};
use crate::backend_executor::{BackendExecutor, BackendRequest};
use crate::config::SkillmineConfig;
use crate::template::TemplateEngine;
use anyhow::{Context, Result};

/// How a synthesis ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The model output parsed against the schema
    Analyzed,
    /// The fallback profile was substituted
    Fallback { reason: String },
}

/// Result of analyzing one author
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub profile: AuthorProfile,
    /// Model text, or the error message when there is none
    pub raw_text: String,
    pub outcome: Outcome,
}

impl Synthesis {
    fn fallback(name: &str, email: &str, raw_text: String, reason: String) -> Self {
        Self {
            profile: AuthorProfile::fallback(name, email),
            raw_text,
            outcome: Outcome::Fallback { reason },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback { .. })
    }
}

/// Builds prompts, calls the model once per author and validates the reply
pub struct ProfileSynthesizer {
    backend: Box<dyn BackendExecutor>,
    engine: TemplateEngine,
    template: String,
    char_budget: usize,
}

impl ProfileSynthesizer {
    /// Create a synthesizer with the built-in prompt
    pub fn new(backend: Box<dyn BackendExecutor>, char_budget: usize) -> Self {
        Self {
            backend,
            engine: TemplateEngine::new(),
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            char_budget,
        }
    }

    /// Create a synthesizer from config, loading a custom prompt template if set
    pub fn from_config(backend: Box<dyn BackendExecutor>, config: &SkillmineConfig) -> Result<Self> {
        let mut synthesizer = Self::new(backend, config.analysis.char_budget);

        if let Some(path) = config.prompt_template_path()? {
            let template = synthesizer
                .engine
                .load_file(&path)
                .with_context(|| format!("loading prompt template {}", path.display()))?;
            tracing::info!(path = %path.display(), "Using custom prompt template");
            synthesizer.template = template;
        }

        Ok(synthesizer)
    }

    /// Replace the prompt template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Analyze one author. Never fails: errors yield the fallback profile.
    pub async fn synthesize(&self, name: &str, email: &str, messages: &[String]) -> Synthesis {
        let commits_text = build_commit_blob(messages, self.char_budget);

        let prompt = match render_prompt(&self.engine, &self.template, name, email, &commits_text)
        {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(email, error = %e, "Failed to render prompt");
                return Synthesis::fallback(name, email, format!("Error: {}", e), e.to_string());
            }
        };

        let response = match self.backend.execute(&BackendRequest::new(prompt)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    email,
                    backend = self.backend.name(),
                    error = %e,
                    "Model call failed"
                );
                return Synthesis::fallback(name, email, format!("Error: {}", e), e.to_string());
            }
        };

        tracing::debug!(
            email,
            duration_ms = response.duration.as_millis() as u64,
            model = response.model.as_deref().unwrap_or("unknown"),
            total_tokens = response.usage.as_ref().and_then(|u| u.total_tokens),
            "Model call completed"
        );

        match parse_profile(&response.text, name, email) {
            Ok(profile) => Synthesis {
                profile,
                raw_text: response.text,
                outcome: Outcome::Analyzed,
            },
            Err(e) => {
                tracing::warn!(email, error = %e, "Model output failed validation");
                Synthesis::fallback(name, email, response.text, e.to_string())
            }
        }
    }
}
