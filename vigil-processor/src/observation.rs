use tracing::{debug, error, info, trace, warn};
use vigil_crypto::hash::vaa_signing_digest;
use vigil_crypto::keys::recover_address;
use vigil_crypto::vaa::verify_signatures;
use vigil_types::gossip::{GossipMessage, SignedObservation, SignedVaaWithQuorum};
use vigil_types::primitives::{guardian_address_to_hex, Hash, Timestamp};
use vigil_types::vaa::Vaa;

use crate::error::ProcessorError;
use crate::processor::Processor;
use crate::state::ObservationState;

impl Processor {
    /// A signature gossiped by another guardian (or echoed back to us).
    pub fn handle_observation(
        &mut self,
        m: SignedObservation,
        now: Timestamp,
    ) -> Result<(), ProcessorError> {
        let signer = match recover_address(&m.hash, &m.signature) {
            Ok(signer) => signer,
            Err(e) => {
                warn!(
                    digest = %hex::encode(m.hash),
                    message_id = %m.message_id,
                    error = %e,
                    "failed to recover observation signer"
                );
                return Ok(());
            }
        };
        if signer != m.addr {
            warn!(
                digest = %hex::encode(m.hash),
                claimed = %guardian_address_to_hex(&m.addr),
                recovered = %guardian_address_to_hex(&signer),
                "observation signer does not match claimed address"
            );
            return Ok(());
        }

        let snapshot = self.state.get(&m.hash).and_then(|s| s.gs.clone());
        let known = snapshot.as_ref().is_some_and(|gs| gs.contains(&signer))
            || self.guardian_sets.find_signer(&signer, now).is_some();
        if !known {
            warn!(
                digest = %hex::encode(m.hash),
                signer = %guardian_address_to_hex(&signer),
                "observation from unknown guardian"
            );
            return Ok(());
        }

        let current = self.gs.clone();
        let entry = self
            .state
            .entry(m.hash)
            .or_insert_with(|| ObservationState::new(now, current));
        entry.signatures.insert(signer, m.signature);
        trace!(
            digest = %hex::encode(m.hash),
            message_id = %m.message_id,
            signer = %guardian_address_to_hex(&signer),
            signatures = entry.signatures.len(),
            "recorded observation"
        );

        self.check_for_quorum(&m.hash)
    }

    /// Emit the VAA for `digest` if it just reached quorum.
    ///
    /// Only signatures from the guardian set snapshotted on the entry count.
    /// The entry is marked submitted before anything leaves the processor.
    pub(crate) fn check_for_quorum(&mut self, digest: &Hash) -> Result<(), ProcessorError> {
        let Some(entry) = self.state.get_mut(digest) else {
            return Ok(());
        };
        if entry.submitted {
            return Ok(());
        }
        let (Some(obs), Some(gs)) = (entry.our_observation.as_ref(), entry.gs.clone()) else {
            // Without our own observation there is no body to sign over.
            return Ok(());
        };

        let mut signatures = entry.ordered_signatures(&gs);
        let quorum = gs.quorum();
        if signatures.len() < quorum {
            trace!(
                digest = %hex::encode(digest),
                have = signatures.len(),
                need = quorum,
                "no quorum yet"
            );
            return Ok(());
        }
        signatures.truncate(quorum);

        let mut vaa = obs.vaa().clone();
        vaa.guardian_set_index = gs.index;
        vaa.signatures = signatures;

        if std::mem::replace(&mut entry.submitted, true) {
            return Err(ProcessorError::DoubleEmission {
                digest: hex::encode(digest),
            });
        }

        info!(
            message_id = %vaa.message_id(),
            digest = %hex::encode(digest),
            source = entry.source,
            signatures = vaa.signatures.len(),
            guardian_set = gs.index,
            "signed VAA with quorum"
        );
        self.emit(vaa);
        Ok(())
    }

    fn emit(&self, vaa: Vaa) {
        if let Err(e) = self.vaa_store.store_signed_vaa(&vaa) {
            error!(message_id = %vaa.message_id(), error = %e, "failed to store signed VAA");
        }
        match vaa.to_bytes() {
            Ok(bytes) => {
                self.send_gossip(GossipMessage::SignedVaaWithQuorum(SignedVaaWithQuorum {
                    vaa: bytes,
                }))
            }
            Err(e) => error!(message_id = %vaa.message_id(), error = %e, "failed to encode VAA"),
        }
        self.send_vaa(vaa);
    }

    /// A VAA that already carries a quorum, received from a peer.
    pub fn handle_inbound_signed_vaa(&mut self, m: SignedVaaWithQuorum, now: Timestamp) {
        match Vaa::from_bytes(&m.vaa) {
            Ok(vaa) => {
                self.settle_signed_vaa(vaa, "peer", now);
            }
            Err(e) => debug!(error = %e, len = m.vaa.len(), "dropping malformed signed VAA"),
        }
    }

    /// Verify a finalized VAA against the set that signed it, persist it and
    /// settle the matching entry. Returns whether the VAA was accepted.
    pub(crate) fn settle_signed_vaa(&mut self, vaa: Vaa, source: &str, now: Timestamp) -> bool {
        let message_id = vaa.message_id();

        let Some(gs) = self.guardian_sets.get_by_index(vaa.guardian_set_index, now) else {
            debug!(
                %message_id,
                source,
                guardian_set = vaa.guardian_set_index,
                "dropping signed VAA for unknown guardian set"
            );
            return false;
        };
        if let Err(e) = verify_signatures(&vaa, &gs) {
            warn!(%message_id, source, error = %e, "dropping signed VAA with invalid signatures");
            return false;
        }

        match self.vaa_store.has_signed_vaa(&message_id) {
            Ok(true) => {
                trace!(%message_id, source, "signed VAA already stored");
                return true;
            }
            Ok(false) => {}
            Err(e) => warn!(%message_id, error = %e, "failed to look up signed VAA"),
        }

        if let Err(e) = self.vaa_store.store_signed_vaa(&vaa) {
            error!(%message_id, error = %e, "failed to store signed VAA");
            return false;
        }

        let digest = vaa_signing_digest(&vaa);
        if let Some(entry) = self.state.get_mut(&digest) {
            entry.submitted = true;
            entry.settled = true;
        }
        debug!(%message_id, source, digest = %hex::encode(digest), "stored signed VAA");
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::*;
    use vigil_types::gossip::SignedVaaWithQuorum;
    use vigil_types::guardian_set::GuardianSet;

    #[test]
    fn test_mismatched_signer_is_dropped() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(1);

        let mut forged = signed_observation(&keys[1], &msg, &h.gs);
        forged.addr = keys[2].address();
        h.processor.handle_observation(forged, NOW).unwrap();
        assert!(h.processor.observation(&digest_of(&msg, &h.gs)).is_none());
    }

    #[test]
    fn test_non_guardian_is_dropped() {
        let keys = guardian_keys(5);
        let mut h = harness(&keys[..4], 0);
        let msg = message(1);

        h.processor
            .handle_observation(signed_observation(&keys[4], &msg, &h.gs), NOW)
            .unwrap();
        assert_eq!(h.processor.tracked(), 0);
    }

    #[test]
    fn test_duplicate_signature_last_write_wins() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(1);
        let first = signed_observation(&keys[1], &msg, &h.gs);
        h.processor.handle_observation(first.clone(), NOW).unwrap();
        h.processor.handle_observation(first, NOW + 1).unwrap();

        let entry = h.processor.observation(&digest_of(&msg, &h.gs)).unwrap();
        assert_eq!(entry.signatures.len(), 1);
        assert_eq!(entry.first_observed, NOW);
    }

    #[test]
    fn test_previous_set_signer_accepted_during_grace() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(1);
        let old = h.gs.clone();
        h.processor
            .handle_guardian_set(GuardianSet::new(old.index + 1, vec![keys[0].address()]), NOW);

        h.processor
            .handle_observation(signed_observation(&keys[3], &msg, &old), NOW + 60)
            .unwrap();
        assert_eq!(h.processor.tracked(), 1);

        // After the grace period the old set no longer vouches.
        let other = message(2);
        h.processor
            .handle_observation(signed_observation(&keys[3], &other, &old), NOW + 2 * 86_400)
            .unwrap();
        assert_eq!(h.processor.tracked(), 1);
    }

    #[test]
    fn test_inbound_signed_vaa_is_stored_and_settles_entry() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(5);

        // We observed it but nobody else's signatures reached us.
        h.processor.handle_message_publication(msg.clone(), NOW).unwrap();
        let vaa = signed_vaa(&keys, &[1, 2, 3], &msg, &h.gs);
        h.processor.handle_inbound_signed_vaa(
            SignedVaaWithQuorum {
                vaa: vaa.to_bytes().unwrap(),
            },
            NOW + 1,
        );

        assert_eq!(
            h.processor.vaa_store.get_signed_vaa(&msg.message_id()).unwrap(),
            Some(vaa)
        );
        let entry = h.processor.observation(&digest_of(&msg, &h.gs)).unwrap();
        assert!(entry.submitted && entry.settled);
        // Nothing is re-emitted locally.
        assert!(h.vaa_rx.try_recv().is_err());
    }

    #[test]
    fn test_inbound_signed_vaa_rejections() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(6);
        let id = msg.message_id();
        let mut feed = |vaa: &vigil_types::vaa::Vaa| {
            h.processor.handle_inbound_signed_vaa(
                SignedVaaWithQuorum {
                    vaa: vaa.to_bytes().unwrap(),
                },
                NOW,
            );
        };

        // Below quorum.
        feed(&signed_vaa(&keys, &[0, 1], &msg, &h.gs));
        // Signed with the right keys but under an unknown set index.
        let mut wrong_set = h.gs.clone();
        wrong_set.index += 7;
        feed(&signed_vaa(&keys, &[0, 1, 2], &msg, &wrong_set));
        // Out of order.
        let mut unordered = signed_vaa(&keys, &[0, 1, 2], &msg, &h.gs);
        unordered.signatures.swap(0, 2);
        feed(&unordered);

        h.processor.handle_inbound_signed_vaa(SignedVaaWithQuorum { vaa: vec![1, 2, 3] }, NOW);
        assert!(!h.processor.vaa_store.has_signed_vaa(&id).unwrap());
    }
}
