//! Save-time definition validation.
//!
//! The save path must reject invalid definitions; the interpreter never
//! re-checks. Cycle detection is an iterative DFS with an explicit stack
//! and a visit budget, so even corrupt adjacency data terminates.

use std::collections::{HashMap, HashSet};

use vigil_core::NodeId;
use vigil_http::HttpMethod;

use crate::definition::{EdgeHandle, WorkflowDefinition};
use crate::error::WorkflowError;
use crate::node::{ActionConfig, NodeKind};
use crate::trigger::TriggerKind;

/// Validate a whole definition. Returns the first violation found.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    def.timeout()?;
    validate_trigger_block(def)?;

    let index = def.node_index();

    // Node-local checks.
    let mut trigger_count = 0usize;
    for node in &def.nodes {
        if node.kind.name().trim().is_empty() {
            return Err(WorkflowError::Invalid(format!(
                "node {} has no name",
                node.id
            )));
        }
        match &node.kind {
            NodeKind::Trigger { .. } => trigger_count += 1,
            NodeKind::Action { config, .. } => validate_action(node.id, config)?,
            NodeKind::Condition { field, .. } => {
                if field.trim().is_empty() {
                    return Err(WorkflowError::Invalid(format!(
                        "condition node {} has an empty field path",
                        node.id
                    )));
                }
            }
            NodeKind::Delay {
                duration_minutes, ..
            } => {
                if *duration_minutes == 0 {
                    return Err(WorkflowError::Invalid(format!(
                        "delay node {} must wait at least one minute",
                        node.id
                    )));
                }
            }
        }
    }
    if trigger_count != 1 {
        return Err(WorkflowError::Invalid(format!(
            "definition must have exactly one trigger node, found {trigger_count}"
        )));
    }

    // Edge checks.
    let mut out_edges: HashMap<NodeId, Vec<Option<EdgeHandle>>> = HashMap::new();
    for edge in &def.edges {
        if edge.source == edge.target {
            return Err(WorkflowError::Invalid(format!(
                "self-edge on node {}",
                edge.source
            )));
        }
        for endpoint in [edge.source, edge.target] {
            if !index.contains_key(&endpoint) {
                return Err(WorkflowError::Invalid(format!(
                    "edge {} references unknown node {endpoint}",
                    edge.id
                )));
            }
        }
        out_edges
            .entry(edge.source)
            .or_default()
            .push(edge.source_handle);
    }

    for node in &def.nodes {
        let handles = out_edges.get(&node.id).cloned().unwrap_or_default();
        match &node.kind {
            NodeKind::Condition { .. } => {
                let trues = handles.iter().filter(|h| **h == Some(EdgeHandle::True)).count();
                let falses = handles
                    .iter()
                    .filter(|h| **h == Some(EdgeHandle::False))
                    .count();
                if handles.len() != 2 || trues != 1 || falses != 1 {
                    return Err(WorkflowError::Invalid(format!(
                        "condition node {} needs exactly one true and one false edge",
                        node.id
                    )));
                }
            }
            _ => {
                if handles.len() > 1 {
                    return Err(WorkflowError::Invalid(format!(
                        "node {} has {} outgoing edges, at most one allowed",
                        node.id,
                        handles.len()
                    )));
                }
                if handles.iter().any(Option::is_some) {
                    return Err(WorkflowError::Invalid(format!(
                        "node {} carries a branch handle but is not a condition",
                        node.id
                    )));
                }
            }
        }
    }

    let trigger = def
        .trigger_node()
        .map(|n| n.id)
        .unwrap_or_else(|| unreachable!("trigger counted above"));

    detect_cycle(def, trigger)?;
    check_reachability(def, trigger)?;
    Ok(())
}

fn validate_trigger_block(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    let trigger = &def.trigger;
    match trigger.kind {
        TriggerKind::Age => {
            let threshold = trigger.age_threshold_minutes.unwrap_or(0);
            if threshold == 0 {
                return Err(WorkflowError::Invalid(
                    "age trigger requires ageThresholdMinutes >= 1".into(),
                ));
            }
        }
        TriggerKind::StateChanged => {
            if let Some(filter) = &trigger.state_transition
                && filter.from.is_none()
                && filter.to.is_none()
            {
                return Err(WorkflowError::Invalid(
                    "stateTransition filter needs from, to, or both".into(),
                ));
            }
        }
        TriggerKind::IncidentCreated | TriggerKind::Escalation | TriggerKind::Manual => {}
    }
    for condition in &trigger.conditions {
        if condition.field.trim().is_empty() {
            return Err(WorkflowError::Invalid(
                "trigger condition has an empty field path".into(),
            ));
        }
    }
    Ok(())
}

fn validate_action(node_id: NodeId, config: &ActionConfig) -> Result<(), WorkflowError> {
    match config {
        ActionConfig::Webhook {
            url, method, retry, ..
        } => {
            if url.trim().is_empty() {
                return Err(WorkflowError::Invalid(format!(
                    "webhook node {node_id} has no url"
                )));
            }
            if !matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch) {
                return Err(WorkflowError::Invalid(format!(
                    "webhook node {node_id} method must be POST, PUT, or PATCH"
                )));
            }
            if let Some(retry) = retry {
                if retry.attempts == 0 || retry.attempts > 5 {
                    return Err(WorkflowError::Invalid(format!(
                        "webhook node {node_id} retry attempts must be 1..=5"
                    )));
                }
                if retry.initial_delay_ms < 100 {
                    return Err(WorkflowError::Invalid(format!(
                        "webhook node {node_id} retry initialDelayMs must be >= 100"
                    )));
                }
            }
        }
        ActionConfig::Jira {
            project_key,
            issue_type,
            summary,
            ..
        } => {
            for (field, value) in [
                ("projectKey", project_key),
                ("issueType", issue_type),
                ("summary", summary),
            ] {
                if value.trim().is_empty() {
                    return Err(WorkflowError::Invalid(format!(
                        "jira node {node_id} is missing {field}"
                    )));
                }
            }
        }
        ActionConfig::Linear {
            team_id,
            title,
            priority,
            ..
        } => {
            for (field, value) in [("teamId", team_id), ("title", title)] {
                if value.trim().is_empty() {
                    return Err(WorkflowError::Invalid(format!(
                        "linear node {node_id} is missing {field}"
                    )));
                }
            }
            if let Some(priority) = priority
                && *priority > 4
            {
                return Err(WorkflowError::Invalid(format!(
                    "linear node {node_id} priority must be 0..=4"
                )));
            }
        }
    }

    for template in config.templated_fields() {
        if let Err(error) = vigil_template::validate(template) {
            return Err(WorkflowError::Template { node_id, error });
        }
    }
    Ok(())
}

/// Iterative three-color DFS from the trigger; grey-on-grey is a cycle.
fn detect_cycle(def: &WorkflowDefinition, trigger: NodeId) -> Result<(), WorkflowError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }
    let mut colors: HashMap<NodeId, Color> =
        def.nodes.iter().map(|n| (n.id, Color::White)).collect();
    // (node, entering); entering=false pops the grey mark.
    let mut stack: Vec<(NodeId, bool)> = vec![(trigger, true)];
    let budget = def.nodes.len() * 4 + def.edges.len() * 2 + 8;
    let mut steps = 0usize;

    while let Some((node, entering)) = stack.pop() {
        steps += 1;
        if steps > budget {
            return Err(WorkflowError::Cycle(node));
        }
        if entering {
            match colors.get(&node).copied() {
                Some(Color::Grey) => return Err(WorkflowError::Cycle(node)),
                Some(Color::Black) => continue,
                _ => {}
            }
            colors.insert(node, Color::Grey);
            stack.push((node, false));
            for edge in def.edges_from(node) {
                match colors.get(&edge.target).copied() {
                    Some(Color::Grey) => return Err(WorkflowError::Cycle(edge.target)),
                    Some(Color::Black) | None => {}
                    Some(Color::White) => stack.push((edge.target, true)),
                }
            }
        } else {
            colors.insert(node, Color::Black);
        }
    }
    Ok(())
}

/// Every non-trigger node must be reachable from the trigger.
fn check_reachability(def: &WorkflowDefinition, trigger: NodeId) -> Result<(), WorkflowError> {
    let mut seen: HashSet<NodeId> = HashSet::from([trigger]);
    let mut stack = vec![trigger];
    while let Some(node) = stack.pop() {
        for edge in def.edges_from(node) {
            if seen.insert(edge.target) {
                stack.push(edge.target);
            }
        }
    }
    for node in &def.nodes {
        if !seen.contains(&node.id) {
            return Err(WorkflowError::Invalid(format!(
                "node {} ({}) is unreachable from the trigger",
                node.id,
                node.kind.name()
            )));
        }
    }
    Ok(())
}
