//! Prompt assembly for profile synthesis

use crate::template::{TemplateEngine, TemplateError};
use minijinja::context;

/// Appended to commit text cut at the character budget
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Variables available to profile prompt templates
pub const PROMPT_VARS: &[&str] = &["name", "email", "commits_text", "format_instructions"];

/// Built-in prompt template
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a technical recruiter extracting a "Skill Keyword Profile" from git logs.

Developer: {{ name }} ({{ email }})
Logs:
{{ commits_text }}

**STRICT INSTRUCTIONS**:
1. **NO SENTENCES**. Output specific keywords or short phrases (2-5 words) only.
2. **Specific Integrations**: Look for specific API names, 3rd party tools, or hardware integrations (e.g., instead of "Payment", output "Stripe API").
3. **Domain Concepts**: Look for business logic keywords (e.g., "Court Date Logic", "Inventory Management").
4. **Tech Stack**: Look for specific libraries, not just languages (e.g., instead of "Javascript", output "React Query" or "Express.js").

Analyze the logs and fill the JSON schema strictly.

{{ format_instructions }}
"#;

/// Schema description appended to every prompt
pub const FORMAT_INSTRUCTIONS: &str = r#"Respond with ONLY a JSON object, no prose and no markdown, matching this schema:
{
  "name": string,
  "email": string,
  "summary": string,            // a single sentence describing the developer's role
  "skills": {
    "specific_integrations": [string],  // APIs, SDKs, external services, e.g. "Stripe API", "AWS S3"
    "domain_concepts": [string],        // business logic keywords, e.g. "Invoicing Logic"
    "technical_stack": [string]         // libraries, frameworks, patterns, e.g. "Redux Toolkit"
  }
}
Every list entry is a 2-5 word keyword phrase, never a sentence. Prefer specific named tools over generic categories."#;

/// Join commit messages into one bullet list, capped at `budget` characters.
///
/// Over-budget text keeps its first `budget` characters and gains
/// [`TRUNCATION_MARKER`], so the result never exceeds `budget` plus the marker.
pub fn build_commit_blob(messages: &[String], budget: usize) -> String {
    let joined = messages
        .iter()
        .map(|msg| format!("- {}", msg))
        .collect::<Vec<_>>()
        .join("\n");

    match joined.char_indices().nth(budget) {
        Some((cut, _)) => {
            let mut truncated = joined[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => joined,
    }
}

/// Render the profile prompt for one author
pub fn render_prompt(
    engine: &TemplateEngine,
    template: &str,
    name: &str,
    email: &str,
    commits_text: &str,
) -> Result<String, TemplateError> {
    engine.render(
        template,
        context! {
            name => name,
            email => email,
            commits_text => commits_text,
            format_instructions => FORMAT_INSTRUCTIONS,
        },
        PROMPT_VARS,
    )
}
