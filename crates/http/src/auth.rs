//! Outbound auth variants.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::HttpError;

/// How an outbound request authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSpec {
    /// No authentication.
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer {
        /// The bearer token.
        token: String,
    },
    /// HTTP basic auth.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// OAuth2 client-credentials grant; the token is fetched from
    /// `token_url` and cached until expiry.
    Oauth2 {
        /// Token endpoint.
        token_url: String,
        /// Client id.
        client_id: String,
        /// Client secret.
        client_secret: String,
    },
    /// Arbitrary pass-through headers.
    Custom {
        /// Headers applied verbatim.
        headers: IndexMap<String, String>,
    },
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide oauth2 token cache, keyed by `(token_url, client_id)`.
#[derive(Debug, Default)]
pub(crate) struct TokenCache {
    tokens: Mutex<IndexMap<String, CachedToken>>,
}

/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenCache {
    fn cache_key(token_url: &str, client_id: &str) -> String {
        format!("{token_url}#{client_id}")
    }

    /// A cached, still-valid token if present.
    fn get(&self, token_url: &str, client_id: &str) -> Option<String> {
        let tokens = self.tokens.lock();
        let cached = tokens.get(&Self::cache_key(token_url, client_id))?;
        (cached.expires_at > Utc::now()).then(|| cached.access_token.clone())
    }

    fn put(&self, token_url: &str, client_id: &str, token: &TokenResponse) {
        let ttl = token.expires_in.unwrap_or(3600).max(EXPIRY_MARGIN_SECS + 1);
        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(ttl - EXPIRY_MARGIN_SECS),
        };
        self.tokens
            .lock()
            .insert(Self::cache_key(token_url, client_id), cached);
    }

    /// Resolve a bearer token for a client-credentials grant, fetching
    /// and caching when the cache misses.
    pub(crate) async fn bearer_for(
        &self,
        http: &reqwest::Client,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, HttpError> {
        if let Some(token) = self.get(token_url, client_id) {
            return Ok(token);
        }

        tracing::debug!(token_url, client_id, "fetching oauth2 token");
        let response = http
            .post(token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| HttpError::TokenFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HttpError::TokenFetch(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| HttpError::TokenFetch(e.to_string()))?;
        self.put(token_url, client_id, &token);
        Ok(token.access_token)
    }
}

/// Apply an auth spec to a request builder.
pub(crate) async fn apply_auth(
    builder: reqwest::RequestBuilder,
    auth: &AuthSpec,
    http: &reqwest::Client,
    cache: &TokenCache,
) -> Result<reqwest::RequestBuilder, HttpError> {
    Ok(match auth {
        AuthSpec::None => builder,
        AuthSpec::Bearer { token } => builder.header("authorization", format!("Bearer {token}")),
        AuthSpec::Basic { username, password } => {
            let encoded = BASE64.encode(format!("{username}:{password}"));
            builder.header("authorization", format!("Basic {encoded}"))
        }
        AuthSpec::Oauth2 {
            token_url,
            client_id,
            client_secret,
        } => {
            let token = cache
                .bearer_for(http, token_url, client_id, client_secret)
                .await?;
            builder.header("authorization", format!("Bearer {token}"))
        }
        AuthSpec::Custom { headers } => {
            let mut builder = builder;
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            builder
        }
    })
}
