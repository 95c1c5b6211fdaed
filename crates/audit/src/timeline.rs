//! Timeline grouping.
//!
//! The incident timeline folds the flat event stream into entries: events
//! that share a `metadata.executionId` collapse into one parent "workflow
//! execution" entry whose state is derived from the terminal event present.

use indexmap::IndexMap;
use serde::Serialize;

use crate::event::AuditEvent;

/// Derived state of a grouped workflow-execution entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionGroupState {
    /// No terminal event observed yet.
    Running,
    /// A `workflow.execution.completed` event is present.
    Completed,
    /// A `workflow.execution.failed` event is present.
    Failed,
}

/// One rendered timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    /// A standalone event.
    Single {
        /// The event.
        event: AuditEvent,
    },
    /// A group of events belonging to one workflow execution.
    ExecutionGroup {
        /// The shared `executionId`.
        execution_id: String,
        /// Derived group state.
        state: ExecutionGroupState,
        /// Member events, oldest first.
        events: Vec<AuditEvent>,
    },
}

/// Fold a flat, oldest-first event stream into timeline entries.
///
/// Groups appear at the position of their first member; ungrouped events
/// keep their place. The input order is preserved otherwise.
#[must_use]
pub fn group_timeline(events: Vec<AuditEvent>) -> Vec<TimelineEntry> {
    // First pass: bucket grouped events by execution id, preserving the
    // position of each group's first member.
    let mut entries: Vec<Option<TimelineEntry>> = Vec::with_capacity(events.len());
    let mut groups: IndexMap<String, usize> = IndexMap::new();

    for event in events {
        match event.execution_id_meta().map(str::to_owned) {
            None => entries.push(Some(TimelineEntry::Single { event })),
            Some(execution_id) => {
                if let Some(&slot) = groups.get(&execution_id) {
                    if let Some(TimelineEntry::ExecutionGroup { events, .. }) =
                        entries[slot].as_mut()
                    {
                        events.push(event);
                    }
                } else {
                    groups.insert(execution_id.clone(), entries.len());
                    entries.push(Some(TimelineEntry::ExecutionGroup {
                        execution_id,
                        state: ExecutionGroupState::Running,
                        events: vec![event],
                    }));
                }
            }
        }
    }

    // Second pass: derive each group's state from its terminal events.
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries.into_iter().flatten() {
        match entry {
            TimelineEntry::ExecutionGroup {
                execution_id,
                events,
                ..
            } => {
                let state = if events.iter().any(|e| e.action == "workflow.execution.failed") {
                    ExecutionGroupState::Failed
                } else if events
                    .iter()
                    .any(|e| e.action == "workflow.execution.completed")
                {
                    ExecutionGroupState::Completed
                } else {
                    ExecutionGroupState::Running
                };
                out.push(TimelineEntry::ExecutionGroup {
                    execution_id,
                    state,
                    events,
                });
            }
            single => out.push(single),
        }
    }
    out
}
