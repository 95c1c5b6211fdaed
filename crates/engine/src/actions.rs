//! Action execution.
//!
//! Turns an action config plus a render context into one outbound call
//! and a stored outcome. Webhooks go straight to their URL; jira and
//! linear actions compose provider requests against configured
//! integrations and lift ticket ids out of the responses.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use vigil_execution::ActionOutcome;
use vigil_http::{AuthSpec, CapturedResponse, HttpClient, HttpMethod, RequestSpec, RetryConfig};
use vigil_template::{RenderContext, Template};
use vigil_workflow::ActionConfig;

/// Per-action call timeout.
const ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Jira integration settings.
#[derive(Debug, Clone)]
pub struct JiraIntegration {
    /// Site base URL, e.g. `https://acme.atlassian.net`.
    pub base_url: String,
    /// Auth for the REST API.
    pub auth: AuthSpec,
}

/// Linear integration settings.
#[derive(Debug, Clone)]
pub struct LinearIntegration {
    /// GraphQL endpoint base, `https://api.linear.app` in production.
    pub base_url: String,
    /// API key sent as the Authorization header.
    pub api_key: String,
}

/// Configured third-party integrations.
#[derive(Debug, Clone, Default)]
pub struct IntegrationConfig {
    /// Jira, when connected.
    pub jira: Option<JiraIntegration>,
    /// Linear, when connected.
    pub linear: Option<LinearIntegration>,
}

/// Executes action configs.
pub struct ActionRunner {
    http: Arc<HttpClient>,
    integrations: IntegrationConfig,
}

impl ActionRunner {
    /// Wire the runner.
    #[must_use]
    pub fn new(http: Arc<HttpClient>, integrations: IntegrationConfig) -> Self {
        Self { http, integrations }
    }

    /// Run one action. The returned outcome carries `error` when the
    /// action failed terminally; the interpreter turns that into a
    /// failed execution.
    pub async fn run(&self, config: &ActionConfig, ctx: &RenderContext) -> ActionOutcome {
        match config {
            ActionConfig::Webhook {
                url,
                method,
                headers,
                body,
                auth,
                retry,
            } => {
                self.run_webhook(ctx, url, *method, headers, body, auth.clone(), *retry)
                    .await
            }
            ActionConfig::Jira {
                project_key,
                issue_type,
                summary,
                description,
                priority,
                labels,
            } => {
                self.run_jira(
                    ctx,
                    project_key,
                    issue_type,
                    summary,
                    description,
                    priority.as_deref(),
                    labels,
                )
                .await
            }
            ActionConfig::Linear {
                team_id,
                title,
                description,
                priority,
            } => {
                self.run_linear(ctx, team_id, title, description, *priority)
                    .await
            }
        }
    }

    async fn run_webhook(
        &self,
        ctx: &RenderContext,
        url: &str,
        method: HttpMethod,
        headers: &IndexMap<String, String>,
        body: &str,
        auth: AuthSpec,
        retry: Option<RetryConfig>,
    ) -> ActionOutcome {
        let url = match render(url, ctx) {
            Ok(url) => url,
            Err(error) => return ActionOutcome { error: Some(error), ..Default::default() },
        };
        let mut rendered_headers = IndexMap::new();
        for (name, value) in headers {
            match render(value, ctx) {
                Ok(value) => {
                    rendered_headers.insert(name.clone(), value);
                }
                Err(error) => return ActionOutcome { error: Some(error), ..Default::default() },
            }
        }
        let body = match render(body, ctx) {
            Ok(body) => body,
            Err(error) => return ActionOutcome { error: Some(error), ..Default::default() },
        };

        let spec = RequestSpec {
            url,
            method,
            headers: rendered_headers,
            body: (!body.is_empty()).then_some(body),
            auth,
            timeout: ACTION_TIMEOUT,
            retry,
        };
        match self.http.execute(&spec).await {
            Ok(captured) => outcome_from_response(&captured, None),
            Err(error) => ActionOutcome {
                error: Some(error.to_string()),
                ..Default::default()
            },
        }
    }

    async fn run_jira(
        &self,
        ctx: &RenderContext,
        project_key: &str,
        issue_type: &str,
        summary: &str,
        description: &str,
        priority: Option<&str>,
        labels: &[String],
    ) -> ActionOutcome {
        let Some(jira) = &self.integrations.jira else {
            return ActionOutcome {
                error: Some("jira integration not configured".into()),
                ..Default::default()
            };
        };
        let (summary, description) = match (render(summary, ctx), render(description, ctx)) {
            (Ok(s), Ok(d)) => (s, d),
            (Err(error), _) | (_, Err(error)) => {
                return ActionOutcome { error: Some(error), ..Default::default() };
            }
        };

        let mut fields = serde_json::json!({
            "project": {"key": project_key},
            "issuetype": {"name": issue_type},
            "summary": summary,
            "description": description,
        });
        if let Some(priority) = priority {
            fields["priority"] = serde_json::json!({"name": priority});
        }
        if !labels.is_empty() {
            fields["labels"] = serde_json::json!(labels);
        }

        let spec = RequestSpec {
            url: format!("{}/rest/api/2/issue", jira.base_url.trim_end_matches('/')),
            method: HttpMethod::Post,
            headers: IndexMap::from([("content-type".to_owned(), "application/json".to_owned())]),
            body: Some(serde_json::json!({"fields": fields}).to_string()),
            auth: jira.auth.clone(),
            timeout: ACTION_TIMEOUT,
            retry: None,
        };
        match self.http.execute(&spec).await {
            Ok(captured) if captured.is_success() => {
                let parsed: Value =
                    serde_json::from_str(&captured.body_preview).unwrap_or(Value::Null);
                let key = parsed
                    .get("key")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let ticket_url = key
                    .as_ref()
                    .map(|k| format!("{}/browse/{k}", jira.base_url.trim_end_matches('/')));
                let mut outcome = outcome_from_response(&captured, None);
                outcome.ticket_id = key;
                outcome.ticket_url = ticket_url;
                outcome
            }
            Ok(captured) => outcome_from_response(
                &captured,
                Some(format!("jira returned status {}", captured.status)),
            ),
            Err(error) => ActionOutcome {
                error: Some(error.to_string()),
                ..Default::default()
            },
        }
    }

    async fn run_linear(
        &self,
        ctx: &RenderContext,
        team_id: &str,
        title: &str,
        description: &str,
        priority: Option<u8>,
    ) -> ActionOutcome {
        let Some(linear) = &self.integrations.linear else {
            return ActionOutcome {
                error: Some("linear integration not configured".into()),
                ..Default::default()
            };
        };
        let (title, description) = match (render(title, ctx), render(description, ctx)) {
            (Ok(t), Ok(d)) => (t, d),
            (Err(error), _) | (_, Err(error)) => {
                return ActionOutcome { error: Some(error), ..Default::default() };
            }
        };

        let mut input = serde_json::json!({
            "teamId": team_id,
            "title": title,
            "description": description,
        });
        if let Some(priority) = priority {
            input["priority"] = serde_json::json!(priority);
        }
        let query = "mutation IssueCreate($input: IssueCreateInput!) { \
                     issueCreate(input: $input) { success issue { id identifier url } } }";

        let spec = RequestSpec {
            url: format!("{}/graphql", linear.base_url.trim_end_matches('/')),
            method: HttpMethod::Post,
            headers: IndexMap::from([("content-type".to_owned(), "application/json".to_owned())]),
            body: Some(
                serde_json::json!({"query": query, "variables": {"input": input}}).to_string(),
            ),
            auth: AuthSpec::Custom {
                headers: IndexMap::from([(
                    "authorization".to_owned(),
                    linear.api_key.clone(),
                )]),
            },
            timeout: ACTION_TIMEOUT,
            retry: None,
        };
        match self.http.execute(&spec).await {
            Ok(captured) if captured.is_success() => {
                let parsed: Value =
                    serde_json::from_str(&captured.body_preview).unwrap_or(Value::Null);
                let issue = &parsed["data"]["issueCreate"]["issue"];
                let mut outcome = outcome_from_response(&captured, None);
                outcome.ticket_id = issue
                    .get("identifier")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                outcome.ticket_url = issue.get("url").and_then(Value::as_str).map(str::to_owned);
                outcome
            }
            Ok(captured) => outcome_from_response(
                &captured,
                Some(format!("linear returned status {}", captured.status)),
            ),
            Err(error) => ActionOutcome {
                error: Some(error.to_string()),
                ..Default::default()
            },
        }
    }
}

fn render(template: &str, ctx: &RenderContext) -> Result<String, String> {
    Template::parse(template)
        .and_then(|t| t.render(ctx))
        .map_err(|e| format!("template error: {e}"))
}

fn outcome_from_response(captured: &CapturedResponse, error: Option<String>) -> ActionOutcome {
    let error = error.or_else(|| {
        (!captured.is_success()).then(|| format!("upstream returned status {}", captured.status))
    });
    ActionOutcome {
        status_code: Some(captured.status),
        error,
        ..Default::default()
    }
    .with_preview(&captured.body_preview)
}
