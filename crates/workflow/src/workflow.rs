//! The workflow entity and its export form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::{TeamId, UserId, WorkflowId};

use crate::definition::{Edge, Settings, WorkflowDefinition};
use crate::error::WorkflowError;
use crate::node::Node;
use crate::trigger::TriggerConfig;
use crate::validate::validate_definition;

/// Who a workflow fires for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Fires for every incident.
    Global,
    /// Fires only for one team's incidents.
    Team {
        /// The owning team.
        #[serde(rename = "teamId")]
        team_id: TeamId,
    },
}

impl Scope {
    /// Whether the scope covers an incident of `team_id`.
    #[must_use]
    pub fn covers(&self, team_id: TeamId) -> bool {
        match self {
            Self::Global => true,
            Self::Team { team_id: own } => *own == team_id,
        }
    }
}

/// A versioned workflow. Versions are immutable: every edit produces a
/// new version, and in-flight executions keep reading the snapshot they
/// were created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Identity, stable across versions.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Scope.
    #[serde(flatten)]
    pub scope: Scope,
    /// Monotonic version, starting at 1.
    pub version: u32,
    /// Whether the workflow fires.
    pub enabled: bool,
    /// The node graph.
    pub definition: WorkflowDefinition,
    /// The author.
    pub created_by: UserId,
    /// Creation time of this version.
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Build and validate version 1 of a workflow.
    pub fn create(
        name: impl Into<String>,
        description: impl Into<String>,
        scope: Scope,
        definition: WorkflowDefinition,
        created_by: UserId,
    ) -> Result<Self, WorkflowError> {
        validate_definition(&definition)?;
        let enabled = definition.settings.enabled;
        Ok(Self {
            id: WorkflowId::v4(),
            name: name.into(),
            description: description.into(),
            scope,
            version: 1,
            enabled,
            definition,
            created_by,
            created_at: Utc::now(),
        })
    }

    /// Produce the next version with a new definition.
    pub fn with_definition(&self, definition: WorkflowDefinition) -> Result<Self, WorkflowError> {
        validate_definition(&definition)?;
        let mut next = self.clone();
        next.version += 1;
        next.enabled = definition.settings.enabled;
        next.definition = definition;
        next.created_at = Utc::now();
        Ok(next)
    }

    /// Export to the persisted JSON document form.
    #[must_use]
    pub fn export(&self) -> WorkflowExport {
        WorkflowExport {
            id: self.id.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version,
            trigger: self.definition.trigger.clone(),
            nodes: self.definition.nodes.clone(),
            edges: self.definition.edges.clone(),
            settings: self.definition.settings.clone(),
        }
    }
}

/// The bit-exact persisted/exportable workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExport {
    /// Workflow id as a string.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Version.
    pub version: u32,
    /// Trigger block.
    pub trigger: TriggerConfig,
    /// Nodes.
    pub nodes: Vec<Node>,
    /// Edges.
    pub edges: Vec<Edge>,
    /// Settings.
    pub settings: Settings,
}

impl WorkflowExport {
    /// Rebuild a definition from an imported document, re-validating it.
    pub fn into_definition(self) -> Result<WorkflowDefinition, WorkflowError> {
        let definition = WorkflowDefinition {
            trigger: self.trigger,
            nodes: self.nodes,
            edges: self.edges,
            settings: self.settings,
        };
        validate_definition(&definition)?;
        Ok(definition)
    }
}
