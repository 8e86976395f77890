use tracing::{debug, info, warn};
use vigil_crypto::hash::observation_request_digest;
use vigil_crypto::keys::GuardianKey;
use vigil_types::gossip::{GossipMessage, ObservationRequest, SignedObservationRequest};
use vigil_types::primitives::{Hash, Timestamp};

use crate::processor::Processor;
use crate::state::ObservationState;

impl Processor {
    /// Periodic pass over every tracked digest: settle, retry and evict.
    pub fn handle_cleanup(&mut self, now: Timestamp) {
        let mut evict: Vec<Hash> = Vec::new();
        let mut outbound: Vec<GossipMessage> = Vec::new();
        let cfg = &self.config;

        for (digest, s) in self.state.iter_mut() {
            let delta = now.saturating_sub(s.first_observed);

            if !s.submitted && delta > cfg.settlement_secs {
                if let Some(obs) = &s.our_observation {
                    // Finalized by a peer's VAA that we stored.
                    if let Ok(true) = self.vaa_store.has_signed_vaa(&obs.message_id()) {
                        debug!(
                            digest = %hex::encode(digest),
                            message_id = %obs.message_id(),
                            "already have signed VAA, dropping observation"
                        );
                        evict.push(*digest);
                        continue;
                    }
                }
            }

            if !s.settled && delta > cfg.settlement_secs {
                s.settled = true;
                if let Some(gs) = &s.gs {
                    let mut missed = 0;
                    for guardian in s.missing_signers(gs) {
                        *self.misses.entry(*guardian).or_default() += 1;
                        missed += 1;
                    }
                    debug!(
                        digest = %hex::encode(digest),
                        signatures = s.signatures.len(),
                        quorum = gs.quorum(),
                        missed,
                        submitted = s.submitted,
                        "observation settled"
                    );
                }
            }

            if s.submitted {
                if delta >= cfg.submitted_retention_secs {
                    evict.push(*digest);
                }
                continue;
            }

            let max_age = if s.our_observation.is_some() {
                cfg.own_retention_secs
            } else {
                cfg.foreign_retention_secs
            };
            if delta >= max_age {
                info!(
                    digest = %hex::encode(digest),
                    ours = s.our_observation.is_some(),
                    signatures = s.signatures.len(),
                    retries = s.retry_count,
                    "expiring unsubmitted observation"
                );
                evict.push(*digest);
                continue;
            }

            if delta < cfg.first_retry_secs
                || now.saturating_sub(s.last_retry) < cfg.retry_backoff(s.retry_count)
            {
                continue;
            }
            match &s.our_observation {
                Some(obs) if obs.is_reliable() => {
                    if s.retry_count >= cfg.max_retries {
                        continue;
                    }
                    s.retry_count += 1;
                    s.last_retry = now;
                    info!(
                        digest = %hex::encode(digest),
                        message_id = %obs.message_id(),
                        retry = s.retry_count,
                        signatures = s.signatures.len(),
                        "requesting re-observation"
                    );
                    if let Some(req) = observation_request(&self.key, s) {
                        outbound.push(GossipMessage::SignedObservationRequest(req));
                    }
                    if let Some(our_msg) = &s.our_msg {
                        outbound.push(GossipMessage::SignedObservation(our_msg.clone()));
                    }
                }
                Some(obs) => {
                    info!(
                        digest = %hex::encode(digest),
                        message_id = %obs.message_id(),
                        source = s.source,
                        "dropping unsubmitted observation that cannot be re-observed"
                    );
                    evict.push(*digest);
                }
                None => {}
            }
        }

        for digest in &evict {
            self.state.remove(digest);
        }
        for msg in outbound {
            self.send_gossip(msg);
        }
    }
}

/// A signed request asking every guardian to observe the entry's source
/// transaction again.
fn observation_request(key: &GuardianKey, s: &ObservationState) -> Option<SignedObservationRequest> {
    let obs = s.our_observation.as_ref()?;
    let request = ObservationRequest {
        chain_id: obs.emitter_chain(),
        tx_hash: s.tx_hash?,
    };
    let bytes = match borsh::to_vec(&request) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to encode observation request");
            return None;
        }
    };
    match key.sign(&observation_request_digest(&bytes)) {
        Ok(signature) => Some(SignedObservationRequest {
            observation_request: bytes,
            signature,
            guardian_addr: key.address(),
        }),
        Err(e) => {
            warn!(error = %e, "failed to sign observation request");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::*;
    use vigil_crypto::hash::observation_request_digest;
    use vigil_crypto::keys::recover_address;
    use vigil_types::gossip::{GossipMessage, ObservationRequest, SignedVaaWithQuorum};

    const MIN: u64 = 60;

    #[test]
    fn test_settlement_records_misses() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(1);
        h.processor.handle_message_publication(msg.clone(), NOW).unwrap();
        h.processor
            .handle_observation(signed_observation(&keys[1], &msg, &h.gs), NOW)
            .unwrap();

        h.processor.handle_cleanup(NOW + 10);
        assert!(!h.processor.observation(&digest_of(&msg, &h.gs)).unwrap().settled);

        h.processor.handle_cleanup(NOW + 31);
        assert!(h.processor.observation(&digest_of(&msg, &h.gs)).unwrap().settled);
        assert_eq!(h.processor.misses(&keys[0].address()), 0);
        assert_eq!(h.processor.misses(&keys[1].address()), 0);
        assert_eq!(h.processor.misses(&keys[2].address()), 1);
        assert_eq!(h.processor.misses(&keys[3].address()), 1);

        // Settling happens once.
        h.processor.handle_cleanup(NOW + 62);
        assert_eq!(h.processor.misses(&keys[2].address()), 1);
    }

    #[test]
    fn test_retries_with_backoff() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(2);
        h.processor.handle_message_publication(msg.clone(), NOW).unwrap();
        drain(&mut h.gossip_rx);
        let digest = digest_of(&msg, &h.gs);

        h.processor.handle_cleanup(NOW + 4 * MIN);
        assert!(drain(&mut h.gossip_rx).is_empty());

        h.processor.handle_cleanup(NOW + 5 * MIN);
        let out = drain(&mut h.gossip_rx);
        assert_eq!(out.len(), 2);
        let GossipMessage::SignedObservationRequest(ref req) = out[0] else {
            panic!("expected observation request, got {}", out[0].kind());
        };
        let decoded: ObservationRequest = borsh::from_slice(&req.observation_request).unwrap();
        assert_eq!(decoded.chain_id, msg.emitter_chain);
        assert_eq!(decoded.tx_hash, msg.tx_hash);
        let signer = recover_address(
            &observation_request_digest(&req.observation_request),
            &req.signature,
        )
        .unwrap();
        assert_eq!(signer, keys[0].address());
        assert!(matches!(out[1], GossipMessage::SignedObservation(_)));
        assert_eq!(h.processor.observation(&digest).unwrap().retry_count, 1);

        // Next retry waits 10 minutes after the first.
        h.processor.handle_cleanup(NOW + 14 * MIN);
        assert!(drain(&mut h.gossip_rx).is_empty());
        h.processor.handle_cleanup(NOW + 15 * MIN);
        assert_eq!(drain(&mut h.gossip_rx).len(), 2);
        assert_eq!(h.processor.observation(&digest).unwrap().retry_count, 2);
    }

    #[test]
    fn test_retries_stop_at_limit() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(3);
        h.processor.handle_message_publication(msg.clone(), NOW).unwrap();
        let digest = digest_of(&msg, &h.gs);

        h.processor.state.get_mut(&digest).unwrap().retry_count = 10;
        drain(&mut h.gossip_rx);

        h.processor.handle_cleanup(NOW + 23 * 60 * MIN);
        assert!(drain(&mut h.gossip_rx).is_empty());
        assert_eq!(h.processor.observation(&digest).unwrap().retry_count, 10);

        // Own observations live for 24h.
        h.processor.handle_cleanup(NOW + 24 * 60 * MIN - 1);
        assert!(h.processor.observation(&digest).is_some());
        h.processor.handle_cleanup(NOW + 24 * 60 * MIN);
        assert!(h.processor.observation(&digest).is_none());
    }

    #[test]
    fn test_unreliable_observation_is_dropped_at_first_retry() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let vaa = message(4).create_vaa(h.gs.index);
        let digest = vigil_crypto::hash::vaa_signing_digest(&vaa);
        h.processor.handle_injection(vaa, NOW).unwrap();
        drain(&mut h.gossip_rx);

        h.processor.handle_cleanup(NOW + 4 * MIN);
        assert!(h.processor.observation(&digest).is_some());
        h.processor.handle_cleanup(NOW + 5 * MIN);
        assert!(h.processor.observation(&digest).is_none());
        assert!(drain(&mut h.gossip_rx).is_empty());
    }

    #[test]
    fn test_foreign_observation_expires_after_an_hour() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(5);
        h.processor
            .handle_observation(signed_observation(&keys[1], &msg, &h.gs), NOW)
            .unwrap();

        h.processor.handle_cleanup(NOW + 30 * MIN);
        assert_eq!(h.processor.tracked(), 1);
        // Not ours: never re-requested.
        assert!(drain(&mut h.gossip_rx).is_empty());

        h.processor.handle_cleanup(NOW + 59 * MIN);
        assert_eq!(h.processor.tracked(), 1);
        h.processor.handle_cleanup(NOW + 60 * MIN);
        assert_eq!(h.processor.tracked(), 0);
    }

    #[test]
    fn test_submitted_entry_evicted_after_an_hour() {
        let keys = guardian_keys(1);
        let mut h = harness(&keys, 0);
        let msg = message(6);
        h.processor.handle_message_publication(msg.clone(), NOW).unwrap();
        let digest = digest_of(&msg, &h.gs);
        assert!(h.processor.observation(&digest).unwrap().submitted);

        h.processor.handle_cleanup(NOW + 59 * MIN);
        assert!(h.processor.observation(&digest).is_some());
        h.processor.handle_cleanup(NOW + 60 * MIN);
        assert!(h.processor.observation(&digest).is_none());
    }

    #[test]
    fn test_observation_finalized_by_peer_is_evicted() {
        let keys = guardian_keys(4);
        let mut h = harness(&keys, 0);
        let msg = message(7);
        h.processor.handle_message_publication(msg.clone(), NOW).unwrap();
        let digest = digest_of(&msg, &h.gs);

        // Already in the store, so the inbound copy is ignored and the entry
        // is left unsubmitted.
        let vaa = signed_vaa(&keys, &[1, 2, 3], &msg, &h.gs);
        h.processor.vaa_store.store_signed_vaa(&vaa).unwrap();
        h.processor.handle_inbound_signed_vaa(
            SignedVaaWithQuorum {
                vaa: vaa.to_bytes().unwrap(),
            },
            NOW,
        );

        h.processor.handle_cleanup(NOW + 20);
        assert!(h.processor.observation(&digest).is_some());
        h.processor.handle_cleanup(NOW + 31);
        assert!(h.processor.observation(&digest).is_none());
    }
}
