//! Escalation policies and their validation.

use serde::{Deserialize, Serialize};
use vigil_core::{PolicyId, ScheduleId, TeamId, UserId};

use crate::error::EscalationError;

/// Most levels a policy may carry.
pub const MAX_LEVELS: usize = 10;
/// Highest allowed repeat count.
pub const MAX_REPEAT: u32 = 9;
/// Minimum timeout for a single-target level, minutes.
pub const MIN_TIMEOUT_SINGLE: u32 = 1;
/// Minimum timeout for an entire-team level, minutes.
pub const MIN_TIMEOUT_TEAM: u32 = 3;

/// Who a level notifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelTarget {
    /// One specific user.
    User {
        /// The user.
        user_id: UserId,
    },
    /// Whoever is on call on a schedule, resolved at dispatch time.
    Schedule {
        /// The schedule.
        schedule_id: ScheduleId,
    },
    /// Every active responder of the incident's team.
    EntireTeam,
}

impl LevelTarget {
    /// Minimum allowed timeout for this target kind, minutes.
    #[must_use]
    pub fn min_timeout_minutes(&self) -> u32 {
        match self {
            Self::EntireTeam => MIN_TIMEOUT_TEAM,
            Self::User { .. } | Self::Schedule { .. } => MIN_TIMEOUT_SINGLE,
        }
    }
}

/// One step of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// 1-based level number; levels are contiguous.
    pub number: u32,
    /// Who gets notified.
    pub target: LevelTarget,
    /// How long to wait for an acknowledgement before the next level.
    pub timeout_minutes: u32,
}

/// An escalation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Identity.
    pub id: PolicyId,
    /// Owning team.
    pub team_id: TeamId,
    /// Display name.
    pub name: String,
    /// At most one default policy per team.
    pub is_default: bool,
    /// Whole-ladder repeats after the last level, 0..=9.
    pub repeat: u32,
    /// Ordered levels, 1-based and contiguous.
    pub levels: Vec<EscalationLevel>,
}

impl EscalationPolicy {
    /// Build a policy and validate it.
    pub fn new(
        team_id: TeamId,
        name: impl Into<String>,
        repeat: u32,
        levels: Vec<EscalationLevel>,
    ) -> Result<Self, EscalationError> {
        let policy = Self {
            id: PolicyId::v4(),
            team_id,
            name: name.into(),
            is_default: false,
            repeat,
            levels,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check every policy invariant.
    pub fn validate(&self) -> Result<(), EscalationError> {
        if self.levels.is_empty() {
            return Err(EscalationError::InvalidPolicy("policy has no levels".into()));
        }
        if self.levels.len() > MAX_LEVELS {
            return Err(EscalationError::InvalidPolicy(format!(
                "policy has {} levels, maximum is {MAX_LEVELS}",
                self.levels.len()
            )));
        }
        if self.repeat > MAX_REPEAT {
            return Err(EscalationError::InvalidPolicy(format!(
                "repeat count {} exceeds maximum {MAX_REPEAT}",
                self.repeat
            )));
        }
        for (index, level) in self.levels.iter().enumerate() {
            let expected = index as u32 + 1;
            if level.number != expected {
                return Err(EscalationError::InvalidPolicy(format!(
                    "level numbers must be contiguous from 1: expected {expected}, got {}",
                    level.number
                )));
            }
            let min = level.target.min_timeout_minutes();
            if level.timeout_minutes < min {
                return Err(EscalationError::InvalidPolicy(format!(
                    "level {} timeout {}m is below the {min}m minimum",
                    level.number, level.timeout_minutes
                )));
            }
        }
        Ok(())
    }

    /// The level with the given 1-based number.
    #[must_use]
    pub fn level(&self, number: u32) -> Option<&EscalationLevel> {
        self.levels.get(number.checked_sub(1)? as usize)
    }
}
