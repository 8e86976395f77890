//! Guardian sets and the registry that tracks the current and prior set.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::constants::GUARDIAN_SET_GRACE_PERIOD;
use crate::primitives::{GuardianAddress, Timestamp};

/// An ordered, versioned list of guardian addresses.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GuardianSet {
    pub index: u32,
    pub keys: Vec<GuardianAddress>,
}

impl GuardianSet {
    pub fn new(index: u32, keys: Vec<GuardianAddress>) -> Self {
        Self { index, keys }
    }

    /// Minimum number of distinct signatures for a supermajority.
    pub fn quorum(&self) -> usize {
        quorum(self.keys.len())
    }

    /// Position of `addr` in the set.
    pub fn key_index(&self, addr: &GuardianAddress) -> Option<usize> {
        self.keys.iter().position(|k| k == addr)
    }

    pub fn contains(&self, addr: &GuardianAddress) -> bool {
        self.key_index(addr).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Quorum threshold for a set of `num_guardians`: `floor(n * 2 / 3) + 1`.
pub fn quorum(num_guardians: usize) -> usize {
    num_guardians * 2 / 3 + 1
}

#[derive(Debug, Default)]
struct Sets {
    current: Option<Arc<GuardianSet>>,
    /// Superseded set and the time at which it stops being accepted.
    previous: Option<(Arc<GuardianSet>, Timestamp)>,
}

/// Thread-safe registry of the current guardian set and, during rotation,
/// the one it replaced.
///
/// Written only on rotation; read concurrently by watchers, the relay and the
/// processor.
#[derive(Debug)]
pub struct GuardianSetState {
    sets: RwLock<Sets>,
    grace_period: u64,
}

impl Default for GuardianSetState {
    fn default() -> Self {
        Self::new(GUARDIAN_SET_GRACE_PERIOD)
    }
}

impl GuardianSetState {
    pub fn new(grace_period: u64) -> Self {
        Self {
            sets: RwLock::new(Sets::default()),
            grace_period,
        }
    }

    // Poisoning is ignored: every write leaves `Sets` consistent.
    fn read(&self) -> RwLockReadGuard<'_, Sets> {
        self.sets.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Sets> {
        self.sets.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a new current set. The replaced set stays valid until
    /// `now + grace_period`. Re-installing the current index is a no-op.
    pub fn set(&self, gs: Arc<GuardianSet>, now: Timestamp) {
        let mut sets = self.write();
        if let Some(current) = sets.current.take() {
            if current.index == gs.index {
                sets.current = Some(gs);
                return;
            }
            sets.previous = Some((current, now.saturating_add(self.grace_period)));
        }
        sets.current = Some(gs);
    }

    pub fn get(&self) -> Option<Arc<GuardianSet>> {
        self.read().current.clone()
    }

    /// The superseded set, if still inside its grace period.
    pub fn previous(&self, now: Timestamp) -> Option<Arc<GuardianSet>> {
        match &self.read().previous {
            Some((gs, expires_at)) if now < *expires_at => Some(gs.clone()),
            _ => None,
        }
    }

    /// Look up a set by index: the current one, or the prior one within grace.
    pub fn get_by_index(&self, index: u32, now: Timestamp) -> Option<Arc<GuardianSet>> {
        let sets = self.read();
        if let Some(current) = &sets.current {
            if current.index == index {
                return Some(current.clone());
            }
        }
        match &sets.previous {
            Some((gs, expires_at)) if gs.index == index && now < *expires_at => Some(gs.clone()),
            _ => None,
        }
    }

    /// Find the set (current first, then prior within grace) that contains `addr`.
    pub fn find_signer(&self, addr: &GuardianAddress, now: Timestamp) -> Option<Arc<GuardianSet>> {
        let sets = self.read();
        if let Some(current) = &sets.current {
            if current.contains(addr) {
                return Some(current.clone());
            }
        }
        match &sets.previous {
            Some((gs, expires_at)) if now < *expires_at && gs.contains(addr) => Some(gs.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(index: u32, n: u8) -> Arc<GuardianSet> {
        Arc::new(GuardianSet::new(index, (1..=n).map(|i| [i; 20]).collect()))
    }

    #[test]
    fn test_quorum_thresholds() {
        assert_eq!(quorum(0), 1);
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 2);
        assert_eq!(quorum(3), 3);
        assert_eq!(quorum(4), 3);
        assert_eq!(quorum(5), 4);
        assert_eq!(quorum(6), 5);
        assert_eq!(quorum(7), 5);
        assert_eq!(quorum(19), 13);
    }

    #[test]
    fn test_key_index() {
        let gs = set(0, 3);
        assert_eq!(gs.key_index(&[2u8; 20]), Some(1));
        assert_eq!(gs.key_index(&[9u8; 20]), None);
        assert!(gs.contains(&[3u8; 20]));
    }

    #[test]
    fn test_empty_registry() {
        let state = GuardianSetState::default();
        assert!(state.get().is_none());
        assert!(state.get_by_index(0, 0).is_none());
        assert!(state.find_signer(&[1u8; 20], 0).is_none());
    }

    #[test]
    fn test_rotation_keeps_previous_within_grace() {
        let state = GuardianSetState::new(100);
        state.set(set(0, 3), 1_000);
        state.set(Arc::new(GuardianSet::new(1, vec![[9u8; 20]])), 2_000);

        assert_eq!(state.get().unwrap().index, 1);
        assert_eq!(state.get_by_index(0, 2_050).unwrap().index, 0);
        assert_eq!(state.find_signer(&[1u8; 20], 2_050).unwrap().index, 0);
        assert_eq!(state.find_signer(&[9u8; 20], 2_050).unwrap().index, 1);

        // Grace period over.
        assert!(state.get_by_index(0, 2_100).is_none());
        assert!(state.find_signer(&[1u8; 20], 2_100).is_none());
        assert!(state.previous(2_100).is_none());
    }

    #[test]
    fn test_reinstalling_same_index_keeps_previous() {
        let state = GuardianSetState::new(100);
        state.set(set(0, 3), 0);
        state.set(set(1, 4), 10);
        state.set(set(1, 4), 20);
        assert_eq!(state.previous(50).unwrap().index, 0);
    }
}
