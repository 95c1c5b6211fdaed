//! Template parsing.
//!
//! A template is split once into static runs and `{{ ... }}` expressions;
//! the parsed parts are reused for every render. Each expression is either
//! a bare dotted path or a whitelisted helper applied to a path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::helpers::Helper;

/// Maximum number of expressions allowed in a single template.
pub(crate) const MAX_EXPRESSIONS: usize = 1000;

/// Position in the template source (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
}

impl Position {
    pub(crate) fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// One argument of an expression: a dotted path or a quoted literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    /// A dotted path into the render context.
    Path(String),
    /// A double-quoted string literal.
    Literal(String),
}

/// A parsed expression between `{{` and `}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expression {
    /// The helper applied, if any. `None` means plain substitution.
    pub helper: Option<Helper>,
    /// Arguments (first is always the subject path for helpers).
    pub args: Vec<Arg>,
    /// Where the `{{` started.
    pub position: Position,
}

/// A template part: static text or an expression to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplatePart {
    /// Static text copied verbatim into the output.
    Static(String),
    /// An expression evaluated against the render context.
    Expression(Expression),
}

/// Split the source into static runs and expressions.
pub(crate) fn parse(source: &str) -> Result<Vec<TemplatePart>, TemplateError> {
    let mut parts = Vec::new();
    let mut static_run = String::new();
    let mut pos = Position::start();
    let mut expressions = 0usize;

    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '{' && chars.peek() == Some(&'{') {
            let open_pos = pos;
            pos.advance(ch);
            pos.advance(chars.next().unwrap_or('{'));

            if !static_run.is_empty() {
                parts.push(TemplatePart::Static(std::mem::take(&mut static_run)));
            }

            let mut body = String::new();
            let mut closed = false;
            while let Some(inner) = chars.next() {
                if inner == '}' && chars.peek() == Some(&'}') {
                    pos.advance(inner);
                    pos.advance(chars.next().unwrap_or('}'));
                    closed = true;
                    break;
                }
                pos.advance(inner);
                body.push(inner);
            }
            if !closed {
                return Err(TemplateError::Unclosed(open_pos));
            }

            expressions += 1;
            if expressions > MAX_EXPRESSIONS {
                return Err(TemplateError::TooManyExpressions(MAX_EXPRESSIONS));
            }
            parts.push(TemplatePart::Expression(parse_expression(&body, open_pos)?));
        } else {
            pos.advance(ch);
            static_run.push(ch);
        }
    }

    if !static_run.is_empty() {
        parts.push(TemplatePart::Static(static_run));
    }
    Ok(parts)
}

/// Parse one expression body (the text between the braces).
fn parse_expression(body: &str, position: Position) -> Result<Expression, TemplateError> {
    let tokens = tokenize(body, position)?;
    if tokens.is_empty() {
        return Err(TemplateError::Empty(position));
    }

    // A leading path token means plain substitution; a leading bare word
    // that names a helper means helper application.
    match &tokens[0] {
        Arg::Literal(_) => Err(TemplateError::Empty(position)),
        Arg::Path(head) => match Helper::lookup(head) {
            Some(helper) => {
                let args = tokens[1..].to_vec();
                helper.check_args(&args, position)?;
                Ok(Expression {
                    helper: Some(helper),
                    args,
                    position,
                })
            }
            None if tokens.len() == 1 => Ok(Expression {
                helper: None,
                args: tokens,
                position,
            }),
            None => Err(TemplateError::UnknownHelper {
                name: head.clone(),
                position,
            }),
        },
    }
}

/// Split an expression body into path and literal tokens.
fn tokenize(body: &str, position: Position) -> Result<Vec<Arg>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '"' {
            chars.next();
            let mut lit = String::new();
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '"' {
                    closed = true;
                    break;
                }
                lit.push(inner);
            }
            if !closed {
                return Err(TemplateError::UnterminatedString(position));
            }
            tokens.push(Arg::Literal(lit));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Arg::Path(word));
        }
    }
    Ok(tokens)
}
