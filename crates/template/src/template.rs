//! The parsed template type.

use std::fmt;

use crate::context::RenderContext;
use crate::error::TemplateError;
use crate::parser::{Arg, TemplatePart, parse};

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template, caching its structure.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let parts = parse(&source)?;
        Ok(Self { source, parts })
    }

    /// The original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the template contains any expressions at all.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, TemplatePart::Static(_)))
    }

    /// Render against a context.
    ///
    /// Rendering is total: missing paths produce empty output (or the
    /// `default` fallback), so a renamed metadata key degrades the message
    /// instead of failing the workflow that sends it.
    pub fn render(&self, context: &RenderContext) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                TemplatePart::Static(text) => out.push_str(text),
                TemplatePart::Expression(expr) => {
                    let subject = expr.args.first().and_then(|arg| match arg {
                        Arg::Path(path) => context.resolve(path),
                        Arg::Literal(_) => None,
                    });
                    let literal = expr.args.get(1).and_then(|arg| match arg {
                        Arg::Literal(lit) => Some(lit.as_str()),
                        Arg::Path(_) => None,
                    });
                    match &expr.helper {
                        Some(helper) => out.push_str(&helper.apply(subject, literal)),
                        None => out.push_str(&crate::helpers::render_scalar(subject)),
                    }
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Validate a template without rendering it.
///
/// Used at workflow/runbook save time; any parse failure is a validation
/// error surfaced to the author.
pub fn validate(source: &str) -> Result<(), TemplateError> {
    parse(source).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> RenderContext {
        RenderContext::new(json!({
            "id": "0192a7cd-9d3e-7f20-b4ab-3f2e1d0c9b8a",
            "priority": "CRITICAL",
            "createdAt": "2026-03-01T12:30:00Z",
            "metadata": {"service": "payments"}
        }))
        .with_team(json!({"name": "SRE"}))
    }

    #[test]
    fn renders_mixed_static_and_expressions() {
        let tpl = Template::parse("[{{team.name}}] {{incident.priority}} on {{incident.metadata.service}}")
            .expect("parses");
        assert_eq!(tpl.render(&ctx()).unwrap(), "[SRE] CRITICAL on payments");
    }

    #[test]
    fn helpers_compose_into_output() {
        let tpl = Template::parse(
            r#"#{{shortId incident.id}} {{lowercase incident.priority}} at {{dateFormat incident.createdAt "%H:%M"}}"#,
        )
        .expect("parses");
        assert_eq!(tpl.render(&ctx()).unwrap(), "#0c9b8a critical at 12:30");
    }

    #[test]
    fn missing_path_renders_empty() {
        let tpl = Template::parse("[{{incident.metadata.region}}]").expect("parses");
        assert_eq!(tpl.render(&ctx()).unwrap(), "[]");
    }

    #[test]
    fn default_helper_covers_missing_path() {
        let tpl = Template::parse(r#"{{default incident.metadata.region "global"}}"#).expect("parses");
        assert_eq!(tpl.render(&ctx()).unwrap(), "global");
    }

    #[test]
    fn validate_accepts_good_rejects_bad() {
        assert!(validate("{{incident.id}} fired").is_ok());
        assert!(validate("{{incident.id").is_err());
        assert!(validate("{{lookup incident.id}}").is_err());
    }

    #[test]
    fn is_static_detects_expression_free_templates() {
        assert!(Template::parse("plain").unwrap().is_static());
        assert!(!Template::parse("{{incident.id}}").unwrap().is_static());
    }
}
