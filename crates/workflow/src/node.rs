//! Graph nodes.
//!
//! Tagged variants over a shared header: every node carries `id`,
//! `type`, `position`, and kind-specific `data`. The wire shape is
//! `{"id", "type", "position", "data": {...}}`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vigil_core::NodeId;
use vigil_http::{AuthSpec, HttpMethod, RetryConfig};

/// Canvas position, carried for the editor's benefit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// A node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identity within the workflow.
    pub id: NodeId,
    /// Kind tag plus kind-specific data.
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Canvas position.
    #[serde(default)]
    pub position: Position,
}

/// Kind-specific node payload, adjacently tagged as `type` / `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
    /// The graph's entry point; its configuration lives in the
    /// definition-level trigger block.
    Trigger {
        /// Display name.
        name: String,
    },
    /// An outbound side effect.
    Action {
        /// Display name.
        name: String,
        /// What the action does.
        config: ActionConfig,
    },
    /// A two-way branch on a string-equality test.
    Condition {
        /// Display name.
        name: String,
        /// Dotted path into the incident snapshot.
        field: String,
        /// Expected string form.
        value: String,
    },
    /// Suspend the execution for a fixed duration.
    Delay {
        /// Display name.
        name: String,
        /// Minutes to wait.
        duration_minutes: u32,
    },
}

impl NodeKind {
    /// The node's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Trigger { name }
            | Self::Action { name, .. }
            | Self::Condition { name, .. }
            | Self::Delay { name, .. } => name,
        }
    }

    /// The wire name of the kind.
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Trigger { .. } => "trigger",
            Self::Action { .. } => "action",
            Self::Condition { .. } => "condition",
            Self::Delay { .. } => "delay",
        }
    }
}

/// Action configuration, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionConfig {
    /// Arbitrary outbound webhook.
    Webhook {
        /// Target URL (template-interpolated).
        url: String,
        /// POST, PUT, or PATCH.
        method: HttpMethod,
        /// Headers (values template-interpolated).
        #[serde(default)]
        headers: IndexMap<String, String>,
        /// Body (template-interpolated).
        #[serde(default)]
        body: String,
        /// Auth variant.
        #[serde(default)]
        auth: AuthSpec,
        /// Retry policy.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry: Option<RetryConfig>,
    },
    /// Create a Jira issue.
    Jira {
        /// Project key, e.g. `OPS`.
        project_key: String,
        /// Issue type, e.g. `Incident`.
        issue_type: String,
        /// Summary (template-interpolated).
        summary: String,
        /// Description (template-interpolated).
        #[serde(default)]
        description: String,
        /// Priority name, provider-defined.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<String>,
        /// Labels.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
    },
    /// Create a Linear issue.
    Linear {
        /// Linear team identifier.
        team_id: String,
        /// Title (template-interpolated).
        title: String,
        /// Description (template-interpolated).
        #[serde(default)]
        description: String,
        /// Priority 0..=4 (0 = none, 1 = urgent).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<u8>,
    },
}

impl ActionConfig {
    /// The wire name of the action kind.
    #[must_use]
    pub fn action_str(&self) -> &'static str {
        match self {
            Self::Webhook { .. } => "webhook",
            Self::Jira { .. } => "jira",
            Self::Linear { .. } => "linear",
        }
    }

    /// Every template-interpolated string in this config, for save-time
    /// template validation.
    #[must_use]
    pub fn templated_fields(&self) -> Vec<&str> {
        match self {
            Self::Webhook {
                url, headers, body, ..
            } => {
                let mut fields = vec![url.as_str(), body.as_str()];
                fields.extend(headers.values().map(String::as_str));
                fields
            }
            Self::Jira {
                summary,
                description,
                ..
            } => vec![summary.as_str(), description.as_str()],
            Self::Linear {
                title, description, ..
            } => vec![title.as_str(), description.as_str()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn node_wire_shape_is_id_type_position_data() {
        let node = Node {
            id: NodeId::nil(),
            kind: NodeKind::Delay {
                name: "wait".into(),
                duration_minutes: 2,
            },
            position: Position { x: 10.0, y: 20.0 },
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "type": "delay",
                "data": {"name": "wait", "duration_minutes": 2},
                "position": {"x": 10.0, "y": 20.0}
            })
        );
    }

    #[test]
    fn webhook_action_roundtrips() {
        let node = Node {
            id: NodeId::v4(),
            kind: NodeKind::Action {
                name: "notify ops".into(),
                config: ActionConfig::Webhook {
                    url: "https://hooks.example.com/{{incident.id}}".into(),
                    method: HttpMethod::Post,
                    headers: IndexMap::new(),
                    body: r#"{"priority": "{{incident.priority}}"}"#.into(),
                    auth: AuthSpec::None,
                    retry: None,
                },
            },
            position: Position::default(),
        };
        let json = serde_json::to_value(&node).unwrap();
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn condition_data_carries_field_and_value() {
        let json = serde_json::json!({
            "id": NodeId::v4().to_string(),
            "type": "condition",
            "data": {"name": "is critical", "field": "priority", "value": "CRITICAL"},
            "position": {"x": 0.0, "y": 0.0}
        });
        let node: Node = serde_json::from_value(json).unwrap();
        let NodeKind::Condition { field, value, .. } = &node.kind else {
            panic!("expected condition");
        };
        assert_eq!(field, "priority");
        assert_eq!(value, "CRITICAL");
    }
}
