//! Template errors.

use crate::parser::Position;

/// Errors from parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    #[error("unclosed expression starting at {0}")]
    Unclosed(Position),

    /// An expression with no content between the braces.
    #[error("empty expression at {0}")]
    Empty(Position),

    /// A helper name outside the whitelist.
    #[error("unknown helper {name:?} at {position}")]
    UnknownHelper {
        /// The rejected helper name.
        name: String,
        /// Where the expression starts.
        position: Position,
    },

    /// A helper invoked with the wrong number of arguments.
    #[error("helper {name} expects {expected} argument(s), got {got} at {position}")]
    Arity {
        /// The helper.
        name: &'static str,
        /// Expected argument count.
        expected: usize,
        /// Actual argument count.
        got: usize,
        /// Where the expression starts.
        position: Position,
    },

    /// A string literal without a closing quote.
    #[error("unterminated string literal at {0}")]
    UnterminatedString(Position),

    /// An argument that must be a quoted literal but is not.
    #[error("helper {name} expects a quoted literal for argument {index} at {position}")]
    ExpectedLiteral {
        /// The helper.
        name: &'static str,
        /// 1-based argument index.
        index: usize,
        /// Where the expression starts.
        position: Position,
    },

    /// Too many expressions in one template.
    #[error("template has more than {0} expressions")]
    TooManyExpressions(usize),
}
