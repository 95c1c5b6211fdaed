//! The outbound client.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthSpec, TokenCache, apply_auth};
use crate::error::HttpError;
use crate::guard::check_url;
use crate::retry::{RetryConfig, retryable_status};

/// Stored response previews are capped at 4 KiB.
pub const MAX_BODY_PREVIEW_BYTES: usize = 4096;

/// HTTP method for outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One outbound request, fully specified.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Target URL (screened by the SSRF guard before any connect).
    pub url: String,
    /// Method.
    pub method: HttpMethod,
    /// Headers applied before auth.
    pub headers: IndexMap<String, String>,
    /// Request body, sent verbatim.
    pub body: Option<String>,
    /// Auth variant.
    pub auth: AuthSpec,
    /// Hard per-call timeout.
    pub timeout: Duration,
    /// Retry policy; `None` means a single attempt.
    pub retry: Option<RetryConfig>,
}

impl RequestSpec {
    /// A POST with a body and no auth, the common webhook shape.
    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            headers: IndexMap::new(),
            body: Some(body.into()),
            auth: AuthSpec::None,
            timeout: Duration::from_secs(30),
            retry: None,
        }
    }
}

/// What the platform stores about a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResponse {
    /// Status code.
    pub status: u16,
    /// Body truncated to [`MAX_BODY_PREVIEW_BYTES`].
    pub body_preview: String,
    /// Attempts it took to get this response.
    pub attempts: u32,
}

impl CapturedResponse {
    /// Whether the call succeeded (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The shared outbound client.
#[derive(Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    allow_private: bool,
    token_cache: TokenCache,
}

impl HttpClient {
    /// Build a client. `allow_private` admits loopback/RFC1918 targets
    /// and should only be set in development or air-gapped deployments.
    #[must_use]
    pub fn new(allow_private: bool) -> Self {
        Self {
            inner: reqwest::Client::new(),
            allow_private,
            token_cache: TokenCache::default(),
        }
    }

    /// Execute a request, retrying per the spec's policy.
    ///
    /// Only connection failures and retryable statuses (5xx, 429) are
    /// retried; any other response, success or terminal failure alike,
    /// is captured and returned. The caller decides what a non-2xx means.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<CapturedResponse, HttpError> {
        let url = check_url(&spec.url, self.allow_private)?;
        let retry = spec.retry.map(RetryConfig::clamped).unwrap_or_default();

        let mut last_error = String::new();
        for attempt in 1..=retry.attempts {
            if attempt > 1 {
                tokio::time::sleep(retry.delay_for(attempt - 1)).await;
            }

            let mut builder = self
                .inner
                .request(spec.method.as_reqwest(), url.clone())
                .timeout(spec.timeout);
            for (name, value) in &spec.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &spec.body {
                builder = builder.body(body.clone());
            }
            builder = apply_auth(builder, &spec.auth, &self.inner, &self.token_cache).await?;

            match builder.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if retryable_status(status) && attempt < retry.attempts {
                        last_error = format!("status {status}");
                        tracing::warn!(
                            url = %spec.url,
                            status,
                            attempt,
                            "retryable upstream status"
                        );
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Ok(CapturedResponse {
                        status,
                        body_preview: truncate_preview(&body),
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    last_error = error.to_string();
                    tracing::warn!(url = %spec.url, attempt, error = %last_error, "request failed");
                }
            }
        }

        Err(HttpError::Exhausted {
            attempts: retry.attempts,
            last_error,
        })
    }
}

/// Truncate to the preview cap on a char boundary.
fn truncate_preview(body: &str) -> String {
    if body.len() <= MAX_BODY_PREVIEW_BYTES {
        return body.to_owned();
    }
    let mut end = MAX_BODY_PREVIEW_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}
