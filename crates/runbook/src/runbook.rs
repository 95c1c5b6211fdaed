//! The runbook entity.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vigil_core::{RunbookId, TeamId};
use vigil_http::{AuthSpec, HttpMethod, RetryConfig};

use crate::error::RunbookError;
use crate::schema::ParameterSchema;

/// Hard cap on runbook timeouts, seconds.
pub const MAX_TIMEOUT_SECONDS: u32 = 300;

/// Approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Editable, not executable.
    #[default]
    Draft,
    /// Executable.
    Approved,
    /// Retired; not executable.
    Deprecated,
}

/// The outbound call a runbook makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunbookHttpSpec {
    /// Target URL (template-interpolated).
    pub url: String,
    /// Method.
    pub method: HttpMethod,
    /// Headers (values template-interpolated).
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Auth variant.
    #[serde(default)]
    pub auth: AuthSpec,
}

/// A runbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runbook {
    /// Identity.
    pub id: RunbookId,
    /// Display name.
    pub name: String,
    /// Owning team; `None` makes the runbook global.
    #[serde(default)]
    pub team_id: Option<TeamId>,
    /// Approval state; only `Approved` executes.
    pub approval: ApprovalStatus,
    /// Version, bumped on every edit.
    pub version: u32,
    /// The outbound call.
    pub http: RunbookHttpSpec,
    /// Request body template, rendered against `{params, incident?}`.
    #[serde(default)]
    pub payload_template: String,
    /// Typed parameter schema.
    #[serde(default)]
    pub parameters: ParameterSchema,
    /// Per-call timeout, 1..=300 seconds.
    pub timeout_seconds: u32,
    /// Retry policy; absent means one request, one result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Runbook {
    /// Build a DRAFT runbook and validate it.
    pub fn create(
        name: impl Into<String>,
        team_id: Option<TeamId>,
        http: RunbookHttpSpec,
        payload_template: impl Into<String>,
        parameters: ParameterSchema,
        timeout_seconds: u32,
    ) -> Result<Self, RunbookError> {
        let runbook = Self {
            id: RunbookId::v4(),
            name: name.into(),
            team_id,
            approval: ApprovalStatus::Draft,
            version: 1,
            http,
            payload_template: payload_template.into(),
            parameters,
            timeout_seconds,
            retry: None,
            created_at: Utc::now(),
        };
        runbook.validate()?;
        Ok(runbook)
    }

    /// Check definition invariants.
    pub fn validate(&self) -> Result<(), RunbookError> {
        if self.http.url.trim().is_empty() {
            return Err(RunbookError::Invalid("url is required".into()));
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(RunbookError::Invalid(format!(
                "timeout must be 1..={MAX_TIMEOUT_SECONDS} seconds, got {}",
                self.timeout_seconds
            )));
        }
        for template in [self.http.url.as_str(), self.payload_template.as_str()]
            .into_iter()
            .chain(self.http.headers.values().map(String::as_str))
        {
            vigil_template::validate(template)
                .map_err(|e| RunbookError::Invalid(format!("template error: {e}")))?;
        }
        Ok(())
    }
}
