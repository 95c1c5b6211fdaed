//! HTTP layer errors.

/// Errors from the outbound HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The URL failed to parse.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The URL was rejected by the SSRF guard.
    #[error("blocked url: {0}")]
    BlockedUrl(String),

    /// Every attempt failed on connection errors or retryable statuses.
    #[error("upstream unreachable after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The final transport or status error.
        last_error: String,
    },

    /// Token acquisition for an oauth2-authenticated call failed.
    #[error("oauth2 token fetch failed: {0}")]
    TokenFetch(String),

    /// The request could not be constructed.
    #[error("request build failed: {0}")]
    Build(String),
}
