//! The closed helper whitelist.
//!
//! Helpers are a fixed enumeration. There is no registration surface:
//! adding a helper means editing this file, which keeps template
//! capability under code review rather than runtime configuration.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::TemplateError;
use crate::parser::{Arg, Position};

/// A whitelisted template helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    /// Uppercase the rendered value.
    Uppercase,
    /// Lowercase the rendered value.
    Lowercase,
    /// Render the value as compact JSON.
    Json,
    /// The last 6 characters of the rendered value.
    ShortId,
    /// Format an RFC3339 timestamp with a chrono pattern.
    DateFormat,
    /// Substitute a literal fallback when the value is missing or empty.
    Default,
}

impl Helper {
    /// Resolve a helper by its template-visible name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "uppercase" => Some(Self::Uppercase),
            "lowercase" => Some(Self::Lowercase),
            "json" => Some(Self::Json),
            "shortId" => Some(Self::ShortId),
            "dateFormat" => Some(Self::DateFormat),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// The template-visible name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Json => "json",
            Self::ShortId => "shortId",
            Self::DateFormat => "dateFormat",
            Self::Default => "default",
        }
    }

    /// Validate argument count and shape at parse time.
    pub(crate) fn check_args(&self, args: &[Arg], position: Position) -> Result<(), TemplateError> {
        let expected = match self {
            Self::Uppercase | Self::Lowercase | Self::Json | Self::ShortId => 1,
            Self::DateFormat | Self::Default => 2,
        };
        if args.len() != expected {
            return Err(TemplateError::Arity {
                name: self.name(),
                expected,
                got: args.len(),
                position,
            });
        }
        // The trailing argument of the two-argument helpers must be a
        // quoted literal (a format pattern or a fallback string).
        if matches!(self, Self::DateFormat | Self::Default)
            && !matches!(args[1], Arg::Literal(_))
        {
            return Err(TemplateError::ExpectedLiteral {
                name: self.name(),
                index: 2,
                position,
            });
        }
        Ok(())
    }

    /// Apply the helper to a resolved value.
    ///
    /// Rendering never fails: unrenderable inputs degrade to the empty
    /// string so one bad field cannot wedge a notification or webhook.
    pub(crate) fn apply(&self, value: Option<&Value>, literal: Option<&str>) -> String {
        match self {
            Self::Uppercase => render_scalar(value).to_uppercase(),
            Self::Lowercase => render_scalar(value).to_lowercase(),
            Self::Json => value
                .map(|v| serde_json::to_string(v).unwrap_or_default())
                .unwrap_or_else(|| "null".to_owned()),
            Self::ShortId => {
                let rendered = render_scalar(value);
                let tail: Vec<char> = rendered.chars().collect();
                let start = tail.len().saturating_sub(6);
                tail[start..].iter().collect()
            }
            Self::DateFormat => {
                let rendered = render_scalar(value);
                let pattern = literal.unwrap_or("%Y-%m-%dT%H:%M:%SZ");
                match rendered.parse::<DateTime<Utc>>() {
                    Ok(ts) => ts.format(pattern).to_string(),
                    Err(_) => String::new(),
                }
            }
            Self::Default => {
                let rendered = render_scalar(value);
                if rendered.is_empty() {
                    literal.unwrap_or_default().to_owned()
                } else {
                    rendered
                }
            }
        }
    }
}

/// Render a JSON value as display text: strings unquoted, scalars via
/// `to_string`, null/missing empty, containers as compact JSON.
pub(crate) fn render_scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(container) => serde_json::to_string(container).unwrap_or_default(),
    }
}
