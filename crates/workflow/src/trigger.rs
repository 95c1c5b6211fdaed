//! Trigger configuration.

use serde::{Deserialize, Serialize};

/// What fires a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// On incident creation.
    IncidentCreated,
    /// On a state transition, optionally filtered by from/to.
    StateChanged,
    /// When escalation advances to any level.
    Escalation,
    /// Only via explicit API call.
    Manual,
    /// Polled: OPEN incidents older than the threshold.
    Age,
}

/// One AND-combined trigger condition: string equality against a dotted
/// path into the incident (`priority`, `metadata.service`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Dotted path into the incident snapshot.
    pub field: String,
    /// Expected string form of the value.
    pub value: String,
}

/// State-transition filter for `state_changed` triggers. Absent fields
/// match any status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateTransition {
    /// Status before the transition, wire form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Status after the transition, wire form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// The distinguished trigger block of a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Trigger kind.
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    /// AND-combined conditions; empty matches everything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<TriggerCondition>,
    /// For `age` triggers: minutes an incident must stay OPEN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_threshold_minutes: Option<u32>,
    /// For `state_changed` triggers: the transition filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_transition: Option<StateTransition>,
}

impl TriggerConfig {
    /// A bare trigger of the given kind, no conditions.
    #[must_use]
    pub fn of_kind(kind: TriggerKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
            age_threshold_minutes: None,
            state_transition: None,
        }
    }

    /// Whether an observed `from -> to` transition satisfies the filter.
    #[must_use]
    pub fn transition_matches(&self, from: &str, to: &str) -> bool {
        match &self.state_transition {
            None => true,
            Some(filter) => {
                filter.from.as_deref().is_none_or(|f| f == from)
                    && filter.to.as_deref().is_none_or(|t| t == to)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trigger_json_shape_matches_the_wire_schema() {
        let trigger = TriggerConfig {
            kind: TriggerKind::StateChanged,
            conditions: vec![TriggerCondition {
                field: "priority".into(),
                value: "CRITICAL".into(),
            }],
            age_threshold_minutes: None,
            state_transition: Some(StateTransition {
                from: None,
                to: Some("ACKNOWLEDGED".into()),
            }),
        };
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "state_changed",
                "conditions": [{"field": "priority", "value": "CRITICAL"}],
                "stateTransition": {"to": "ACKNOWLEDGED"}
            })
        );
    }

    #[test]
    fn transition_filter_semantics() {
        let mut trigger = TriggerConfig::of_kind(TriggerKind::StateChanged);
        assert!(trigger.transition_matches("OPEN", "ACKNOWLEDGED"));

        trigger.state_transition = Some(StateTransition {
            from: None,
            to: Some("ACKNOWLEDGED".into()),
        });
        assert!(trigger.transition_matches("OPEN", "ACKNOWLEDGED"));
        assert!(!trigger.transition_matches("OPEN", "RESOLVED"));

        trigger.state_transition = Some(StateTransition {
            from: Some("RESOLVED".into()),
            to: Some("OPEN".into()),
        });
        assert!(trigger.transition_matches("RESOLVED", "OPEN"));
        assert!(!trigger.transition_matches("CLOSED", "OPEN"));
    }
}
