//! Per-pair and per-profile locking.
//!
//! Friendship operations serialize on a lock keyed by the unordered pair
//! of profiles they touch. Locks are created on demand in a sharded map
//! and dropped again once nobody holds them, so unrelated pairs never
//! contend on a shared lock.
//!
//! Profile deletion additionally needs to exclude every pair operation
//! that involves the profile. Each profile has a gate: pair operations
//! hold it shared, deletion holds it exclusively.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use dashmap::DashMap;

use super::types::ProfileId;

/// Unordered pair of profile ids; `(a, b)` and `(b, a)` give the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: ProfileId,
    high: ProfileId,
}

impl PairKey {
    /// Creates the key for the pair `{a, b}`.
    #[must_use]
    pub fn new(a: ProfileId, b: ProfileId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Smaller id of the pair.
    #[must_use]
    pub const fn low(&self) -> ProfileId {
        self.low
    }

    /// Larger id of the pair.
    #[must_use]
    pub const fn high(&self) -> ProfileId {
        self.high
    }
}

/// On-demand mutexes, one per profile pair.
#[derive(Debug, Default)]
pub(crate) struct PairLocks {
    locks: DashMap<PairKey, Arc<Mutex<()>>>,
}

impl PairLocks {
    /// Runs `f` while holding the lock for `key`.
    ///
    /// The lock guards no data of its own, so a poisoned lock is still
    /// usable and is simply taken over.
    pub(crate) fn with_pair<R>(&self, key: PairKey, f: impl FnOnce() -> R) -> R {
        // Cloning inside the shard guard keeps the strong count accurate
        // for the cleanup below.
        let lock = self.locks.entry(key).or_default().clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of pair locks currently allocated.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Reader/writer gates, one per profile.
#[derive(Debug, Default)]
pub(crate) struct ProfileGates {
    gates: DashMap<ProfileId, Arc<RwLock<()>>>,
}

impl ProfileGates {
    fn gate(&self, id: ProfileId) -> Arc<RwLock<()>> {
        self.gates.entry(id).or_default().clone()
    }

    /// Runs `f` while holding both profiles' gates shared.
    ///
    /// Gates are taken in id order.
    pub(crate) fn with_shared<R>(&self, a: ProfileId, b: ProfileId, f: impl FnOnce() -> R) -> R {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        let first_gate = self.gate(first);
        let _first = first_gate.read().unwrap_or_else(PoisonError::into_inner);
        if first == second {
            return f();
        }

        let second_gate = self.gate(second);
        let _second = second_gate.read().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Runs `f` while holding the profile's gate exclusively.
    pub(crate) fn with_exclusive<R>(&self, id: ProfileId, f: impl FnOnce() -> R) -> R {
        let gate = self.gate(id);
        let _guard = gate.write().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Drops the gate of a deleted profile.
    pub(crate) fn forget(&self, id: ProfileId) {
        self.gates.remove(&id);
    }
}
