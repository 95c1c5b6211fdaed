//! Outbound notification directives.
//!
//! The escalation engine never delivers anything itself. It hands
//! directives to the notification service's ingress and moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use vigil_core::{IncidentId, UserId};

/// A "notify this user about this incident" instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyDirective {
    /// Who to notify.
    pub user_id: UserId,
    /// About what.
    pub incident_id: IncidentId,
    /// The escalation level that fired (1-based).
    pub level: u32,
    /// Which pass through the ladder.
    pub repeat_index: u32,
    /// When the directive was produced.
    pub at: DateTime<Utc>,
}

/// Where directives go.
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Hand one directive to the notification service.
    async fn notify(&self, directive: NotifyDirective) -> Result<(), String>;
}

/// Collecting sink for tests.
#[derive(Debug, Default)]
pub struct MemoryNotifySink {
    sent: Mutex<Vec<NotifyDirective>>,
}

impl MemoryNotifySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every directive sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<NotifyDirective> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotifySink for MemoryNotifySink {
    async fn notify(&self, directive: NotifyDirective) -> Result<(), String> {
        self.sent.lock().push(directive);
        Ok(())
    }
}
