//! Trigger matching.

use vigil_eventbus::{LifecycleEvent, LifecycleKind};
use vigil_template::{lookup_path, value_to_display};
use vigil_workflow::{TriggerCondition, TriggerKind, Workflow};

/// Whether a lifecycle event fires a workflow.
///
/// Checks, in order: the enabled flag, scope, the cross-workflow cycle
/// guard (a workflow already in the event's cascade chain is skipped),
/// trigger kind with its transition filter, and the AND-combined
/// conditions.
#[must_use]
pub fn event_matches(workflow: &Workflow, event: &LifecycleEvent) -> bool {
    if !workflow.enabled || !workflow.scope.covers(event.team_id) {
        return false;
    }
    if event.chain.contains(&workflow.id) {
        tracing::debug!(
            workflow_id = %workflow.id,
            incident_id = %event.incident_id,
            "workflow skipped: already in cascade chain"
        );
        return false;
    }

    let trigger = &workflow.definition.trigger;
    let kind_matches = match (&trigger.kind, &event.kind) {
        (TriggerKind::IncidentCreated, LifecycleKind::Created) => true,
        (TriggerKind::StateChanged, LifecycleKind::StateChanged { from, to }) => {
            trigger.transition_matches(from, to)
        }
        (TriggerKind::Escalation, LifecycleKind::Escalated { .. }) => true,
        // Manual and age triggers never match bus events.
        _ => false,
    };
    if !kind_matches {
        return false;
    }

    conditions_match(&trigger.conditions, &event.incident)
}

/// Evaluate AND-combined string-equality conditions against an incident
/// snapshot. The observed value is rendered to its display string
/// (scalars unquoted) and compared byte-wise.
#[must_use]
pub fn conditions_match(conditions: &[TriggerCondition], incident: &serde_json::Value) -> bool {
    conditions
        .iter()
        .all(|c| value_to_display(lookup_path(incident, &c.field)) == c.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use vigil_core::{IncidentId, NodeId, TeamId, UserId, WorkflowId};
    use vigil_workflow::{
        Node, NodeKind, Position, Scope, Settings, StateTransition, TriggerConfig,
        WorkflowDefinition,
    };

    fn workflow_with_trigger(trigger: TriggerConfig, scope: Scope) -> Workflow {
        let definition = WorkflowDefinition {
            trigger,
            nodes: vec![Node {
                id: NodeId::v4(),
                kind: NodeKind::Trigger { name: "t".into() },
                position: Position::default(),
            }],
            edges: vec![],
            settings: Settings::default(),
        };
        Workflow::create("wf", "", scope, definition, UserId::v4()).unwrap()
    }

    fn workflow(kind: TriggerKind, scope: Scope) -> Workflow {
        workflow_with_trigger(TriggerConfig::of_kind(kind), scope)
    }

    fn created_event(team: TeamId, incident: serde_json::Value) -> LifecycleEvent {
        LifecycleEvent::new(IncidentId::v4(), team, LifecycleKind::Created, incident)
    }

    #[test]
    fn kind_and_scope_gate_the_match() {
        let team = TeamId::v4();
        let wf = workflow(TriggerKind::IncidentCreated, Scope::Team { team_id: team });

        assert!(event_matches(&wf, &created_event(team, json!({}))));
        assert!(!event_matches(&wf, &created_event(TeamId::v4(), json!({}))));

        let esc = workflow(TriggerKind::Escalation, Scope::Global);
        assert!(!event_matches(&esc, &created_event(team, json!({}))));
    }

    #[test]
    fn disabled_workflow_never_matches() {
        let mut wf = workflow(TriggerKind::IncidentCreated, Scope::Global);
        wf.enabled = false;
        assert!(!event_matches(&wf, &created_event(TeamId::v4(), json!({}))));
    }

    #[test]
    fn manual_and_age_never_match_bus_events() {
        let manual = workflow(TriggerKind::Manual, Scope::Global);
        assert!(!event_matches(&manual, &created_event(TeamId::v4(), json!({}))));

        let mut age_trigger = TriggerConfig::of_kind(TriggerKind::Age);
        age_trigger.age_threshold_minutes = Some(30);
        let age = workflow_with_trigger(age_trigger, Scope::Global);
        assert!(!event_matches(&age, &created_event(TeamId::v4(), json!({}))));
    }

    #[test]
    fn state_transition_filter_applies() {
        let mut wf = workflow(TriggerKind::StateChanged, Scope::Global);
        wf.definition.trigger.state_transition = Some(StateTransition {
            from: None,
            to: Some("ACKNOWLEDGED".into()),
        });

        let event = |to: &str| {
            LifecycleEvent::new(
                IncidentId::v4(),
                TeamId::v4(),
                LifecycleKind::StateChanged {
                    from: "OPEN".into(),
                    to: to.into(),
                },
                json!({}),
            )
        };
        assert!(event_matches(&wf, &event("ACKNOWLEDGED")));
        assert!(!event_matches(&wf, &event("RESOLVED")));
    }

    #[test]
    fn conditions_are_conjunctive_string_equality() {
        let incident = json!({"priority": "CRITICAL", "metadata": {"service": "payments"}});
        let cond = |field: &str, value: &str| TriggerCondition {
            field: field.into(),
            value: value.into(),
        };

        assert!(conditions_match(&[], &incident));
        assert!(conditions_match(&[cond("priority", "CRITICAL")], &incident));
        assert!(conditions_match(
            &[cond("priority", "CRITICAL"), cond("metadata.service", "payments")],
            &incident
        ));
        // One mismatch sinks the conjunction.
        assert!(!conditions_match(
            &[cond("priority", "CRITICAL"), cond("metadata.service", "search")],
            &incident
        ));
        // Missing path renders empty, equal only to the empty string.
        assert!(!conditions_match(&[cond("metadata.region", "eu")], &incident));
        assert!(conditions_match(&[cond("metadata.region", "")], &incident));
    }

    #[test]
    fn chain_guard_skips_workflows_already_in_cascade() {
        let wf = workflow(TriggerKind::IncidentCreated, Scope::Global);
        let mut event = created_event(TeamId::v4(), json!({}));
        assert!(event_matches(&wf, &event));

        event.chain = vec![WorkflowId::v4(), wf.id];
        assert!(!event_matches(&wf, &event));
    }

    #[test]
    fn numeric_fields_compare_as_rendered_strings() {
        let incident = json!({"escalationLevel": 2});
        let cond = TriggerCondition {
            field: "escalationLevel".into(),
            value: "2".into(),
        };
        assert!(conditions_match(&[cond], &incident));
        assert_eq!(value_to_display(lookup_path(&incident, "escalationLevel")), "2");
    }
}
