//! Messages exchanged between guardians over the gossip transport.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::chain::ChainId;
use crate::primitives::{GuardianAddress, Hash, Signature};

/// One guardian's signature over an observation digest.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedObservation {
    /// Claimed signer; must match the address recovered from the signature.
    pub addr: GuardianAddress,
    /// Signing digest of the VAA body.
    pub hash: Hash,
    pub signature: Signature,
    pub tx_hash: Hash,
    /// Human-readable `chain/emitter/sequence`, for logs only.
    pub message_id: String,
}

/// Ask every guardian to look at a source-chain transaction again.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ObservationRequest {
    pub chain_id: ChainId,
    pub tx_hash: Hash,
}

/// An [`ObservationRequest`] signed by a guardian.
///
/// The signature covers the domain-separated digest of
/// `observation_request` (the borsh encoding of the request).
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedObservationRequest {
    pub observation_request: Vec<u8>,
    pub signature: Signature,
    pub guardian_addr: GuardianAddress,
}

/// A serialized VAA that already carries a quorum of signatures.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedVaaWithQuorum {
    pub vaa: Vec<u8>,
}

/// Top-level gossip envelope.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum GossipMessage {
    SignedObservation(SignedObservation),
    SignedObservationRequest(SignedObservationRequest),
    SignedVaaWithQuorum(SignedVaaWithQuorum),
}

impl GossipMessage {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GossipMessage::SignedObservation(_) => "signed_observation",
            GossipMessage::SignedObservationRequest(_) => "signed_observation_request",
            GossipMessage::SignedVaaWithQuorum(_) => "signed_vaa_with_quorum",
        }
    }
}
