//! The fixed-shape render context.
//!
//! Templates see exactly five roots: `incident`, `assignee`, `team`,
//! `workflow`, and `params`. There is no way to reach outside this shape,
//! which is what makes templates safe to accept from tenants.

use serde_json::Value;

/// The bound context a template renders against.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    incident: Value,
    assignee: Option<Value>,
    team: Option<Value>,
    workflow: Option<Value>,
    params: Option<Value>,
}

impl RenderContext {
    /// Context with just an incident snapshot.
    #[must_use]
    pub fn new(incident: Value) -> Self {
        Self {
            incident,
            ..Self::default()
        }
    }

    /// Attach the assigned user.
    #[must_use]
    pub fn with_assignee(mut self, assignee: Value) -> Self {
        self.assignee = Some(assignee);
        self
    }

    /// Attach the owning team.
    #[must_use]
    pub fn with_team(mut self, team: Value) -> Self {
        self.team = Some(team);
        self
    }

    /// Attach the workflow being executed.
    #[must_use]
    pub fn with_workflow(mut self, workflow: Value) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// Attach runbook parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Resolve a dotted path against the context roots.
    ///
    /// Returns `None` for unknown roots and missing fields alike; the
    /// caller decides whether that renders empty or triggers a `default`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let base = match root {
            "incident" => Some(&self.incident),
            "assignee" => self.assignee.as_ref(),
            "team" => self.team.as_ref(),
            "workflow" => self.workflow.as_ref(),
            "params" => self.params.as_ref(),
            _ => None,
        }?;
        segments.try_fold(base, |value, segment| value.get(segment))
    }
}

/// Resolve a dotted path inside a single JSON value.
///
/// Used by trigger-condition evaluation, where paths are relative to the
/// incident itself (`priority`, `metadata.service`).
#[must_use]
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, segment| v.get(segment))
}

/// Render a JSON value the way templates and condition comparisons see it:
/// strings unquoted, scalars via `to_string`, null empty, containers as
/// compact JSON.
#[must_use]
pub fn value_to_display(value: Option<&Value>) -> String {
    crate::helpers::render_scalar(value)
}
