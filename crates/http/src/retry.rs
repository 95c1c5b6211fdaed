//! Retry policy for outbound calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration carried by webhook actions and (optionally)
/// runbooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Total attempts including the first; clamped to 1..=5.
    pub attempts: u32,
    /// Delay before the first retry; at least 100 ms.
    pub initial_delay_ms: u64,
    /// Add up to 50% random jitter to each delay.
    #[serde(default)]
    pub jitter: bool,
}

impl RetryConfig {
    /// A single attempt, no retries.
    #[must_use]
    pub fn single() -> Self {
        Self {
            attempts: 1,
            initial_delay_ms: 100,
            jitter: false,
        }
    }

    /// Clamp the configuration into its allowed ranges.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            attempts: self.attempts.clamp(1, 5),
            initial_delay_ms: self.initial_delay_ms.max(100),
            jitter: self.jitter,
        }
    }

    /// Backoff before retry `attempt` (1-based):
    /// `initial_delay_ms * 2^(attempt-1)`, plus jitter when enabled.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.initial_delay_ms.saturating_mul(1u64 << exp);
        let with_jitter = if self.jitter {
            use rand::RngExt as _;
            let spread = base / 2;
            base + rand::rng().random_range(0..=spread)
        } else {
            base
        };
        Duration::from_millis(with_jitter)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::single()
    }
}

/// Whether a response status warrants a retry: 5xx and 429 do, other
/// 4xx are terminal.
#[must_use]
pub fn retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}
