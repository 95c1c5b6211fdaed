//! Dispatch-time target resolution.
//!
//! On-call lookups happen when the level fires, never earlier: a rotation
//! handover between scheduling and dispatch must reach the person on call
//! *now*.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use vigil_core::{ScheduleId, TeamId, UserId};

/// Directory of users, schedules, and team rosters.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// The user currently on call for a schedule.
    async fn on_call_user(&self, schedule_id: ScheduleId) -> Result<Option<UserId>, String>;

    /// Every active responder of a team.
    async fn team_responders(&self, team_id: TeamId) -> Result<Vec<UserId>, String>;
}

/// Fixed-map directory for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    on_call: RwLock<HashMap<ScheduleId, UserId>>,
    rosters: RwLock<HashMap<TeamId, Vec<UserId>>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the on-call user for a schedule.
    pub fn set_on_call(&self, schedule_id: ScheduleId, user_id: UserId) {
        self.on_call.write().insert(schedule_id, user_id);
    }

    /// Set a team's roster.
    pub fn set_roster(&self, team_id: TeamId, users: Vec<UserId>) {
        self.rosters.write().insert(team_id, users);
    }
}

#[async_trait]
impl TargetDirectory for StaticDirectory {
    async fn on_call_user(&self, schedule_id: ScheduleId) -> Result<Option<UserId>, String> {
        Ok(self.on_call.read().get(&schedule_id).copied())
    }

    async fn team_responders(&self, team_id: TeamId) -> Result<Vec<UserId>, String> {
        Ok(self.rosters.read().get(&team_id).cloned().unwrap_or_default())
    }
}
