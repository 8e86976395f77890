use std::collections::HashMap;
use std::sync::Arc;

use vigil_types::gossip::SignedObservation;
use vigil_types::guardian_set::GuardianSet;
use vigil_types::observation::Observation;
use vigil_types::primitives::{GuardianAddress, Hash, Signature, Timestamp};
use vigil_types::vaa::VaaSignature;

/// Aggregation state for one digest.
///
/// Created the first time the digest is seen, locally or from gossip.
/// `submitted` goes from false to true at most once.
#[derive(Debug, Clone)]
pub struct ObservationState {
    pub first_observed: Timestamp,
    pub last_retry: Timestamp,
    /// Set once our own watcher (or the operator) produced this observation.
    pub our_observation: Option<Observation>,
    /// Signatures by signer. A repeated signer overwrites.
    pub signatures: HashMap<GuardianAddress, Signature>,
    pub submitted: bool,
    pub settled: bool,
    pub retry_count: u32,
    /// Our gossiped signature, kept for re-broadcast on retry.
    pub our_msg: Option<SignedObservation>,
    pub tx_hash: Option<Hash>,
    /// Guardian set in force when the entry was created or we observed it.
    pub gs: Option<Arc<GuardianSet>>,
    pub source: &'static str,
}

impl ObservationState {
    pub fn new(now: Timestamp, gs: Option<Arc<GuardianSet>>) -> Self {
        Self {
            first_observed: now,
            last_retry: now,
            our_observation: None,
            signatures: HashMap::new(),
            submitted: false,
            settled: false,
            retry_count: 0,
            our_msg: None,
            tx_hash: None,
            gs,
            source: "unknown",
        }
    }

    /// Signatures from members of `gs`, ordered by guardian index.
    pub fn ordered_signatures(&self, gs: &GuardianSet) -> Vec<VaaSignature> {
        gs.keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let index = u8::try_from(i).ok()?;
                self.signatures.get(key).map(|sig| VaaSignature {
                    index,
                    signature: *sig,
                })
            })
            .collect()
    }

    /// Members of `gs` that have not signed.
    pub fn missing_signers<'a>(&'a self, gs: &'a GuardianSet) -> impl Iterator<Item = &'a GuardianAddress> {
        gs.keys.iter().filter(|k| !self.signatures.contains_key(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> GuardianSet {
        GuardianSet::new(0, vec![[1u8; 20], [2u8; 20], [3u8; 20], [4u8; 20]])
    }

    #[test]
    fn test_ordered_signatures_follow_set_order() {
        let mut s = ObservationState::new(10, None);
        s.signatures.insert([4u8; 20], [40u8; 65]);
        s.signatures.insert([2u8; 20], [20u8; 65]);
        // Not a member; never included.
        s.signatures.insert([9u8; 20], [90u8; 65]);

        let sigs = s.ordered_signatures(&set());
        let indices: Vec<u8> = sigs.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(sigs[0].signature, [20u8; 65]);
    }

    #[test]
    fn test_missing_signers() {
        let mut s = ObservationState::new(10, None);
        s.signatures.insert([1u8; 20], [0u8; 65]);
        s.signatures.insert([3u8; 20], [0u8; 65]);
        let gs = set();
        let missing: Vec<_> = s.missing_signers(&gs).copied().collect();
        assert_eq!(missing, vec![[2u8; 20], [4u8; 20]]);
    }

    #[test]
    fn test_new_entry_defaults() {
        let s = ObservationState::new(42, None);
        assert_eq!(s.first_observed, 42);
        assert_eq!(s.last_retry, 42);
        assert!(!s.submitted && !s.settled);
        assert_eq!(s.retry_count, 0);
    }
}
