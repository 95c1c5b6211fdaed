//! Environment-driven process configuration.
//!
//! The core reads its configuration once at startup. Unknown variables are
//! ignored; malformed values fail fast so a misconfigured worker never
//! starts half-wired.

use std::collections::HashMap;

use serde::Deserialize;

/// Registered OAuth2 client-credentials grant, keyed by provider name in
/// [`Config::oauth_clients`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OAuthClient {
    /// Token endpoint.
    pub token_url: String,
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
}

/// Process configuration for the automation core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary database DSN.
    pub database_url: String,
    /// Queue backend DSN. Defaults to the database DSN (queue tables live
    /// alongside the entities they drive).
    pub queue_url: String,
    /// Key under which the leader lock is taken for singleton loops
    /// (age poller, audit cleanup).
    pub leader_key: String,
    /// Allow outbound webhooks to loopback / RFC1918 targets.
    pub allow_private_webhooks: bool,
    /// Audit retention window in days.
    pub audit_retention_days: u32,
    /// OAuth2 client registry, parsed from a JSON object
    /// `{"provider": {"token_url": ..., "client_id": ..., "client_secret": ...}}`.
    pub oauth_clients: HashMap<String, OAuthClient>,
}

/// Failure to assemble a [`Config`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable is present but unparseable.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// The offending variable.
        name: &'static str,
        /// Why it failed to parse.
        reason: String,
    },
}

const DATABASE_URL: &str = "VIGIL_DATABASE_URL";
const QUEUE_URL: &str = "VIGIL_QUEUE_URL";
const LEADER_KEY: &str = "VIGIL_LEADER_KEY";
const ALLOW_PRIVATE_WEBHOOKS: &str = "VIGIL_ALLOW_PRIVATE_WEBHOOKS";
const AUDIT_RETENTION_DAYS: &str = "VIGIL_AUDIT_RETENTION_DAYS";
const OAUTH_CLIENTS: &str = "VIGIL_OAUTH_CLIENTS";

/// Default audit retention when unset.
pub const DEFAULT_AUDIT_RETENTION_DAYS: u32 = 90;

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup, used by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL).ok_or(ConfigError::Missing(DATABASE_URL))?;
        let queue_url = lookup(QUEUE_URL).unwrap_or_else(|| database_url.clone());
        let leader_key = lookup(LEADER_KEY).unwrap_or_else(|| "vigil-core".to_owned());

        let allow_private_webhooks = match lookup(ALLOW_PRIVATE_WEBHOOKS).as_deref() {
            None | Some("false" | "0" | "") => false,
            Some("true" | "1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: ALLOW_PRIVATE_WEBHOOKS,
                    reason: format!("expected true/false, got {other:?}"),
                });
            }
        };

        let audit_retention_days = match lookup(AUDIT_RETENTION_DAYS) {
            None => DEFAULT_AUDIT_RETENTION_DAYS,
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: AUDIT_RETENTION_DAYS,
                reason: format!("{e}"),
            })?,
        };

        let oauth_clients = match lookup(OAUTH_CLIENTS) {
            None => HashMap::new(),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                name: OAUTH_CLIENTS,
                reason: format!("{e}"),
            })?,
        };

        Ok(Self {
            database_url,
            queue_url,
            leader_key,
            allow_private_webhooks,
            audit_retention_days,
            oauth_clients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env<'a>(pairs: &'a [(&'static str, &'a str)]) -> impl Fn(&'static str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn minimal_environment_fills_defaults() {
        let cfg = Config::from_lookup(env(&[(DATABASE_URL, "postgres://db/vigil")]))
            .expect("valid config");
        assert_eq!(cfg.queue_url, "postgres://db/vigil");
        assert_eq!(cfg.leader_key, "vigil-core");
        assert!(!cfg.allow_private_webhooks);
        assert_eq!(cfg.audit_retention_days, DEFAULT_AUDIT_RETENTION_DAYS);
        assert!(cfg.oauth_clients.is_empty());
    }

    #[test]
    fn missing_database_url_fails() {
        let err = Config::from_lookup(env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(DATABASE_URL)));
    }

    #[test]
    fn oauth_registry_parses_from_json() {
        let cfg = Config::from_lookup(env(&[
            (DATABASE_URL, "postgres://db/vigil"),
            (
                OAUTH_CLIENTS,
                r#"{"jira": {"token_url": "https://auth.example/token", "client_id": "id", "client_secret": "s3cret"}}"#,
            ),
        ]))
        .expect("valid config");
        assert_eq!(
            cfg.oauth_clients["jira"].token_url,
            "https://auth.example/token"
        );
    }

    #[test]
    fn malformed_bool_is_rejected() {
        let err = Config::from_lookup(env(&[
            (DATABASE_URL, "postgres://db/vigil"),
            (ALLOW_PRIVATE_WEBHOOKS, "yes"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: ALLOW_PRIVATE_WEBHOOKS,
                ..
            }
        ));
    }
}
