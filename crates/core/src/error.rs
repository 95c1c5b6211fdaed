//! The surface error taxonomy.
//!
//! Every user-visible failure in Vigil maps to one of the [`ErrorKind`]
//! classes, which fix both the HTTP status of an API surface and the
//! retry decision of a queue worker. Crate-local error enums convert into
//! [`CoreError`] at the boundary where a failure becomes user-visible.

use serde::{Deserialize, Serialize};

/// Classification of a failure, fixing its surface behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A malformed or incomplete request. No side effect occurred.
    InvalidRequest,
    /// A state-machine transition that the current state does not allow.
    InvalidTransition,
    /// The caller is not a member of the owning team.
    Forbidden,
    /// The referenced entity does not exist.
    NotFound,
    /// The operation conflicts with existing state (duplicate routing key,
    /// policy still referenced by open incidents, ...).
    Conflict,
    /// The mutation would introduce a cycle (service dependencies or
    /// workflow chains).
    Cycle,
    /// Runbook parameters failed schema validation.
    InvalidParameters,
    /// An outbound call failed terminally; the execution records the
    /// failure, the caller sees no error.
    UpstreamFailure,
    /// A transient infrastructure failure; retried per policy.
    Transient,
}

impl ErrorKind {
    /// The HTTP status an API surface maps this kind to.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest
            | Self::InvalidTransition
            | Self::Cycle
            | Self::InvalidParameters => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::UpstreamFailure | Self::Transient => 500,
        }
    }

    /// Whether a queue worker should retry a failure of this kind.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidTransition => "invalid_transition",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Cycle => "cycle",
            Self::InvalidParameters => "invalid_parameters",
            Self::UpstreamFailure => "upstream_failure",
            Self::Transient => "transient",
        };
        f.write_str(s)
    }
}

/// A classified error with a human-readable message.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CoreError {
    kind: ErrorKind,
    message: String,
}

impl CoreError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Shorthand for an [`ErrorKind::InvalidRequest`] error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Shorthand for an [`ErrorKind::InvalidTransition`] error.
    #[must_use]
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTransition, message)
    }

    /// Shorthand for an [`ErrorKind::NotFound`] error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for an [`ErrorKind::Conflict`] error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Shorthand for an [`ErrorKind::Cycle`] error.
    #[must_use]
    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cycle, message)
    }

    /// Shorthand for an [`ErrorKind::Transient`] error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }
}
