//! Template engine for rendering prompts

use super::errors::TemplateError;
use minijinja::{Environment, Value};
use std::path::Path;

/// Template rendering engine
///
/// Wraps minijinja with strict undefined handling so a misspelled variable
/// fails loudly instead of rendering an empty string into the prompt.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine with default configuration
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        // Prompts are plain text
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// `known_vars` feeds the "did you mean" suggestion on undefined variables.
    pub fn render(
        &self,
        template: &str,
        ctx: Value,
        known_vars: &[&str],
    ) -> Result<String, TemplateError> {
        let mut env = self.env.clone();
        env.add_template_owned("__render__", template.to_string())
            .map_err(|e| TemplateError::syntax(e.to_string(), e.line().unwrap_or(0)))?;

        let tmpl = env.get_template("__render__")?;

        tmpl.render(ctx)
            .map_err(|e| convert_minijinja_error(e, known_vars))
    }

    /// Check if a template is syntactically valid
    pub fn validate(&self, template: &str) -> Result<(), TemplateError> {
        let mut env = self.env.clone();
        env.add_template_owned("__validate__", template.to_string())
            .map_err(|e| TemplateError::syntax(e.to_string(), e.line().unwrap_or(0)))?;
        Ok(())
    }

    /// Read a template file and validate it
    pub fn load_file(&self, path: &Path) -> Result<String, TemplateError> {
        let template = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.validate(&template)?;
        Ok(template)
    }
}

/// Convert a minijinja error to our TemplateError type
fn convert_minijinja_error(err: minijinja::Error, known_vars: &[&str]) -> TemplateError {
    let line = err.line().unwrap_or(0);

    if matches!(err.kind(), minijinja::ErrorKind::UndefinedError) {
        let var_name = err
            .detail()
            .and_then(extract_var_from_detail)
            .unwrap_or_else(|| "unknown".to_string());
        return TemplateError::undefined_variable(var_name, line, known_vars);
    }

    TemplateError::Internal(err)
}

/// Extract a variable name quoted in backticks
fn extract_var_from_detail(msg: &str) -> Option<String> {
    let start = msg.find('`')?;
    let end = msg[start + 1..].find('`')?;
    Some(msg[start + 1..start + 1 + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_simple_render() {
        let engine = TemplateEngine::new();
        let result = engine.render("Hello, world!", context! {}, &[]).unwrap();
        assert_eq!(result, "Hello, world!");
    }

    #[test]
    fn test_render_with_vars() {
        let engine = TemplateEngine::new();
        let result = engine
            .render(
                "Developer: {{ name }} ({{ email }})",
                context! { name => "Ada", email => "a@x.com" },
                &["name", "email"],
            )
            .unwrap();
        assert_eq!(result, "Developer: Ada (a@x.com)");
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = TemplateEngine::new();
        let result = engine
            .render(
                "{{ text }}",
                context! { text => "fix: <Button> & \"quotes\"" },
                &["text"],
            )
            .unwrap();
        assert_eq!(result, "fix: <Button> & \"quotes\"");
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let engine = TemplateEngine::new();
        let result = engine.render("{{ emial }}", context! { email => "a@x.com" }, &["email"]);
        let err = result.unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_validate() {
        let engine = TemplateEngine::new();
        assert!(engine.validate("{{ name }}").is_ok());
        assert!(matches!(
            engine.validate("{% if name %}unclosed"),
            Err(TemplateError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prompt.j2");
        std::fs::write(&path, "Profile {{ name }}").unwrap();

        let engine = TemplateEngine::new();
        assert_eq!(engine.load_file(&path).unwrap(), "Profile {{ name }}");

        let missing = dir.path().join("missing.j2");
        assert!(matches!(
            engine.load_file(&missing),
            Err(TemplateError::Io { .. })
        ));
    }
}
