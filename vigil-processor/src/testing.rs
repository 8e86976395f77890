//! Fixtures shared by the processor unit tests.

use std::sync::Arc;

use tokio::sync::mpsc;
use vigil_crypto::hash::vaa_signing_digest;
use vigil_crypto::keys::GuardianKey;
use vigil_storage::memory::MemoryStore;
use vigil_storage::traits::KvStore;
use vigil_types::chain::ChainId;
use vigil_types::gossip::{GossipMessage, SignedObservation, SignedVaaWithQuorum};
use vigil_types::guardian_set::{GuardianSet, GuardianSetState};
use vigil_types::message::MessagePublication;
use vigil_types::primitives::{Hash, Timestamp};
use vigil_types::vaa::Vaa;

use crate::config::ProcessorConfig;
use crate::processor::{Processor, ProcessorInputs};

pub const NOW: Timestamp = 1_700_000_000;

pub struct Harness {
    pub processor: Processor,
    pub gs: GuardianSet,
    pub gossip_rx: mpsc::Receiver<GossipMessage>,
    pub vaa_rx: mpsc::Receiver<Vaa>,
}

/// Deterministic keys: secret scalars 1..=n.
pub fn guardian_keys(n: usize) -> Vec<GuardianKey> {
    (1..=n)
        .map(|i| {
            let mut secret = [0u8; 32];
            secret[31] = i as u8;
            GuardianKey::from_bytes(&secret).unwrap()
        })
        .collect()
}

pub fn guardian_set(keys: &[GuardianKey]) -> GuardianSet {
    GuardianSet::new(4, keys.iter().map(GuardianKey::address).collect())
}

pub fn bare_processor(
    key: &GuardianKey,
) -> (Processor, mpsc::Receiver<GossipMessage>, mpsc::Receiver<Vaa>) {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (gossip_tx, gossip_rx) = mpsc::channel(64);
    let (vaa_tx, vaa_rx) = mpsc::channel(64);
    let processor = Processor::new(
        ProcessorConfig::default(),
        key.clone(),
        Arc::new(GuardianSetState::default()),
        store,
        gossip_tx,
        vaa_tx,
    );
    (processor, gossip_rx, vaa_rx)
}

/// A processor for guardian `index` of a set built from `keys`.
pub fn harness(keys: &[GuardianKey], index: usize) -> Harness {
    harness_with(keys, index, |p| p)
}

pub fn harness_with(
    keys: &[GuardianKey],
    index: usize,
    build: impl FnOnce(Processor) -> Processor,
) -> Harness {
    let (processor, gossip_rx, vaa_rx) = bare_processor(&keys[index]);
    let mut processor = build(processor);
    let gs = guardian_set(keys);
    processor.handle_guardian_set(gs.clone(), NOW);
    Harness {
        processor,
        gs,
        gossip_rx,
        vaa_rx,
    }
}

pub fn message(sequence: u64) -> MessagePublication {
    MessagePublication {
        tx_hash: [0xab; 32],
        timestamp: 1_700_000_000,
        nonce: 7,
        sequence,
        consistency_level: 1,
        emitter_chain: ChainId::SOLANA,
        emitter_address: [0x11; 32],
        payload: b"governance or attestation".to_vec(),
    }
}

pub fn digest_of(msg: &MessagePublication, gs: &GuardianSet) -> Hash {
    vaa_signing_digest(&msg.create_vaa(gs.index))
}

pub fn signed_observation(
    key: &GuardianKey,
    msg: &MessagePublication,
    gs: &GuardianSet,
) -> SignedObservation {
    let hash = digest_of(msg, gs);
    SignedObservation {
        addr: key.address(),
        hash,
        signature: key.sign(&hash).unwrap(),
        tx_hash: msg.tx_hash,
        message_id: msg.message_id().to_string(),
    }
}

/// A VAA for `msg` signed by the guardians at `signers` (ascending).
pub fn signed_vaa(keys: &[GuardianKey], signers: &[usize], msg: &MessagePublication, gs: &GuardianSet) -> Vaa {
    let mut vaa = msg.create_vaa(gs.index);
    for &i in signers {
        let sig = vigil_crypto::vaa::sign_vaa(&vaa, &keys[i], i as u8).unwrap();
        vaa.signatures.push(sig);
    }
    vaa
}

pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

pub struct InputSenders {
    pub guardian_sets: mpsc::Sender<GuardianSet>,
    pub messages: mpsc::Sender<MessagePublication>,
    pub injected: mpsc::Sender<Vaa>,
    pub observations: mpsc::Sender<SignedObservation>,
    pub signed_vaas: mpsc::Sender<SignedVaaWithQuorum>,
}

pub fn processor_inputs() -> (ProcessorInputs, InputSenders) {
    let (gs_tx, gs_rx) = mpsc::channel(8);
    let (msg_tx, msg_rx) = mpsc::channel(8);
    let (inject_tx, inject_rx) = mpsc::channel(8);
    let (obsv_tx, obsv_rx) = mpsc::channel(8);
    let (vaa_tx, vaa_rx) = mpsc::channel(8);
    (
        ProcessorInputs {
            guardian_sets: gs_rx,
            messages: msg_rx,
            accountant_released: None,
            injected: inject_rx,
            observations: obsv_rx,
            signed_vaas: vaa_rx,
        },
        InputSenders {
            guardian_sets: gs_tx,
            messages: msg_tx,
            injected: inject_tx,
            observations: obsv_tx,
            signed_vaas: vaa_tx,
        },
    )
}
