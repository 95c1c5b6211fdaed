//! Leader lock for singleton loops.
//!
//! The age poller and the daily audit cleanup must run on exactly one
//! instance. The lock is keyed by the configured leader key; the
//! in-process implementation covers single-node deployments and tests,
//! while a multi-node deployment backs the same shape with a queue-level
//! advisory lock.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A registry of named leadership slots.
#[derive(Debug, Default, Clone)]
pub struct LeaderLock {
    held: Arc<DashMap<String, ()>>,
}

impl LeaderLock {
    /// Create an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take leadership for `key`. Returns `None` while another
    /// holder is alive; the returned guard releases on drop.
    #[must_use]
    pub fn try_acquire(&self, key: &str) -> Option<LeaderGuard> {
        match self.held.entry(key.to_owned()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(LeaderGuard {
                    held: Arc::clone(&self.held),
                    key: key.to_owned(),
                })
            }
        }
    }

    /// Whether `key` currently has a leader.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains_key(key)
    }
}

/// Held leadership; dropping releases the slot.
#[derive(Debug)]
pub struct LeaderGuard {
    held: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.held.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let lock = LeaderLock::new();
        let guard = lock.try_acquire("age-poller").expect("first acquire");
        assert!(lock.try_acquire("age-poller").is_none());
        assert!(lock.is_held("age-poller"));

        drop(guard);
        assert!(!lock.is_held("age-poller"));
        assert!(lock.try_acquire("age-poller").is_some());
    }

    #[test]
    fn distinct_keys_are_independent() {
        let lock = LeaderLock::new();
        let _a = lock.try_acquire("age-poller").expect("a");
        let _b = lock.try_acquire("audit-cleanup").expect("b");
    }
}
