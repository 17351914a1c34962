//! Author profile schema and strict parsing of model output

use crate::backend_executor::extract_json_object;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Summary used when analysis could not produce a valid profile
pub const FALLBACK_SUMMARY: &str = "Analysis Failed";

/// Keyword breakdown of a developer's capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSet {
    /// Named APIs, SDKs or external services (e.g. "Stripe API")
    pub specific_integrations: Vec<String>,

    /// Business-logic keywords (e.g. "Booking State Machine")
    pub domain_concepts: Vec<String>,

    /// Libraries, frameworks and patterns (e.g. "Redux Toolkit")
    pub technical_stack: Vec<String>,
}

/// Structured skill profile for one author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub name: String,
    pub email: String,

    /// One-sentence role summary
    pub summary: String,

    pub skills: SkillSet,
}

/// Why model text failed to become a profile
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model returned an empty response")]
    Empty,

    #[error("no JSON object found in model output")]
    NoJson,

    #[error("model output does not match the profile schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl AuthorProfile {
    /// The sentinel profile recorded when analysis fails
    pub fn fallback(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            summary: FALLBACK_SUMMARY.to_string(),
            skills: SkillSet::default(),
        }
    }

    /// Whether this is the fallback sentinel
    pub fn is_fallback(&self) -> bool {
        self.summary == FALLBACK_SUMMARY
            && self.skills.specific_integrations.is_empty()
            && self.skills.domain_concepts.is_empty()
            && self.skills.technical_stack.is_empty()
    }
}

/// Parse model text into a profile for the given author.
///
/// Every schema field must be present with the right type; extra keys are
/// ignored. Keywords are trimmed and blanks dropped. Name and email are
/// pinned to the analyzed author whatever the model echoed back.
pub fn parse_profile(text: &str, name: &str, email: &str) -> Result<AuthorProfile, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let object = extract_json_object(text).ok_or(ParseError::NoJson)?;
    let mut profile: AuthorProfile = serde_json::from_value(serde_json::Value::Object(object))?;

    profile.name = name.to_string();
    profile.email = email.to_string();
    profile.summary = profile.summary.trim().to_string();
    normalize_keywords(&mut profile.skills.specific_integrations);
    normalize_keywords(&mut profile.skills.domain_concepts);
    normalize_keywords(&mut profile.skills.technical_stack);

    Ok(profile)
}

fn normalize_keywords(keywords: &mut Vec<String>) {
    for keyword in keywords.iter_mut() {
        *keyword = keyword.trim().to_string();
    }
    keywords.retain(|k| !k.is_empty());
}
