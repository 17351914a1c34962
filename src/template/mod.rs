//! Prompt templating
//!
//! Jinja2-compatible templates (minijinja) for the model prompt. Undefined
//! variables are errors, and output is never HTML-escaped.

mod engine;
mod errors;

pub use engine::TemplateEngine;
pub use errors::TemplateError;
