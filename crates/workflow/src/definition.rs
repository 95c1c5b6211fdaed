//! The workflow definition: nodes, edges, trigger block, settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_core::NodeId;

use crate::error::WorkflowError;
use crate::node::{Node, NodeKind};
use crate::trigger::TriggerConfig;

/// Edge source-handle, used only on condition nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeHandle {
    /// The condition evaluated true.
    #[serde(rename = "true")]
    True,
    /// The condition evaluated false.
    #[serde(rename = "false")]
    False,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Edge identity (editor-assigned, opaque).
    pub id: String,
    /// Source node.
    pub source: NodeId,
    /// Target node.
    pub target: NodeId,
    /// Branch handle; present only on condition out-edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<EdgeHandle>,
}

/// Definition-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Non-delay work budget, e.g. `"5min"`, `"90s"`, `"1h"`.
    pub timeout: String,
    /// Whether the workflow fires at all.
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: "5min".to_owned(),
            enabled: true,
        }
    }
}

/// Parse a settings timeout (`"5min"`, `"90s"`, `"1h"`).
pub fn parse_timeout(raw: &str) -> Result<Duration, WorkflowError> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| WorkflowError::InvalidTimeout(raw.to_owned()))?;
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| WorkflowError::InvalidTimeout(raw.to_owned()))?;
    if value == 0 {
        return Err(WorkflowError::InvalidTimeout(raw.to_owned()));
    }
    let seconds = match unit {
        "s" | "sec" => value,
        "m" | "min" => value * 60,
        "h" => value * 3600,
        _ => return Err(WorkflowError::InvalidTimeout(raw.to_owned())),
    };
    Ok(Duration::from_secs(seconds))
}

/// The node graph plus its trigger block and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// The distinguished trigger configuration.
    pub trigger: TriggerConfig,
    /// All nodes, the trigger node included.
    pub nodes: Vec<Node>,
    /// Directed edges.
    pub edges: Vec<Edge>,
    /// Settings.
    #[serde(default)]
    pub settings: Settings,
}

impl WorkflowDefinition {
    /// Index nodes by id.
    #[must_use]
    pub fn node_index(&self) -> HashMap<NodeId, &Node> {
        self.nodes.iter().map(|n| (n.id, n)).collect()
    }

    /// The single trigger node, if the definition is well-formed.
    #[must_use]
    pub fn trigger_node(&self) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Trigger { .. }))
    }

    /// Outgoing edges of a node.
    #[must_use]
    pub fn edges_from(&self, node: NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == node).collect()
    }

    /// The single successor of a non-condition node.
    #[must_use]
    pub fn successor(&self, node: NodeId) -> Option<NodeId> {
        self.edges_from(node).first().map(|e| e.target)
    }

    /// The successor of a condition node along the given branch.
    #[must_use]
    pub fn branch_successor(&self, node: NodeId, handle: EdgeHandle) -> Option<NodeId> {
        self.edges_from(node)
            .iter()
            .find(|e| e.source_handle == Some(handle))
            .map(|e| e.target)
    }

    /// The parsed non-delay work budget.
    pub fn timeout(&self) -> Result<Duration, WorkflowError> {
        parse_timeout(&self.settings.timeout)
    }
}
