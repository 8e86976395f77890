use std::sync::Arc;

use borsh::BorshDeserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use vigil_crypto::hash::observation_request_digest;
use vigil_crypto::keys::recover_address;
use vigil_types::gossip::{
    GossipMessage, ObservationRequest, SignedObservation, SignedObservationRequest,
    SignedVaaWithQuorum,
};
use vigil_types::guardian_set::GuardianSetState;

use crate::codec::decode_body;
use crate::error::RelayError;
use crate::fanout::DropCounter;

/// Channels the router feeds. Each is bounded; a full channel drops the
/// newest message.
#[derive(Clone)]
pub struct InboundChannels {
    pub observations: mpsc::Sender<SignedObservation>,
    pub observation_requests: mpsc::Sender<ObservationRequest>,
    pub signed_vaas: mpsc::Sender<SignedVaaWithQuorum>,
}

/// Decodes inbound frames and routes them to the processor and watchers.
pub struct InboundRouter {
    channels: InboundChannels,
    guardian_sets: Arc<GuardianSetState>,
    dropped: DropCounter,
}

impl InboundRouter {
    pub fn new(channels: InboundChannels, guardian_sets: Arc<GuardianSetState>) -> Self {
        Self {
            channels,
            guardian_sets,
            dropped: DropCounter::default(),
        }
    }

    /// Messages shed because an inbound channel was full.
    pub fn dropped(&self) -> DropCounter {
        self.dropped.clone()
    }

    /// Decode a frame body and route it. Errors mean the frame was malformed
    /// or failed verification; the caller logs and moves on.
    pub fn dispatch(&self, body: &[u8]) -> Result<(), RelayError> {
        match decode_body(body)? {
            GossipMessage::SignedObservation(m) => {
                self.offer(&self.channels.observations, m, "signed_observation");
            }
            GossipMessage::SignedObservationRequest(m) => {
                let req = self.verify_observation_request(&m)?;
                tracing::debug!(
                    chain = %req.chain_id,
                    tx_hash = %hex::encode(req.tx_hash),
                    "received observation request"
                );
                self.offer(&self.channels.observation_requests, req, "observation_request");
            }
            GossipMessage::SignedVaaWithQuorum(m) => {
                self.offer(&self.channels.signed_vaas, m, "signed_vaa_with_quorum");
            }
        }
        Ok(())
    }

    /// Check that a re-observation request was signed by a current guardian.
    pub fn verify_observation_request(
        &self,
        m: &SignedObservationRequest,
    ) -> Result<ObservationRequest, RelayError> {
        let digest = observation_request_digest(&m.observation_request);
        let signer = recover_address(&digest, &m.signature).map_err(|e| {
            RelayError::InvalidSignature {
                reason: e.to_string(),
            }
        })?;
        if signer != m.guardian_addr {
            return Err(RelayError::InvalidSignature {
                reason: format!(
                    "recovered {} but request claims {}",
                    hex::encode(signer),
                    hex::encode(m.guardian_addr)
                ),
            });
        }
        let known = self
            .guardian_sets
            .get()
            .is_some_and(|gs| gs.contains(&signer));
        if !known {
            return Err(RelayError::UnknownGuardian {
                addr: hex::encode(signer),
            });
        }
        ObservationRequest::try_from_slice(&m.observation_request).map_err(|e| {
            RelayError::CodecError {
                reason: e.to_string(),
            }
        })
    }

    fn offer<T>(&self, tx: &mpsc::Sender<T>, item: T, kind: &'static str) {
        match tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.increment();
                tracing::warn!(kind, "inbound channel full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(kind, "inbound channel closed, dropping message");
            }
        }
    }
}
