//! Guardian nodes on localhost exchanging observations over TCP.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use vigil_crypto::keys::GuardianKey;
use vigil_crypto::vaa::verify_signatures;
use vigil_node::{Node, NodeConfig};
use vigil_types::chain::ChainId;
use vigil_types::guardian_set::GuardianSet;
use vigil_types::message::MessagePublication;
use vigil_types::primitives::guardian_address_to_hex;
use vigil_types::vaa::Vaa;

const GUARDIAN_SET_INDEX: u32 = 2;

fn guardian_keys(n: u8) -> Vec<GuardianKey> {
    (1..=n)
        .map(|i| {
            let mut secret = [0u8; 32];
            secret[31] = i;
            GuardianKey::from_bytes(&secret).unwrap()
        })
        .collect()
}

fn node_config(key: &GuardianKey, keys: &[GuardianKey]) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.guardian.key_hex = Some(key.to_hex());
    config.guardian_set.index = GUARDIAN_SET_INDEX;
    config.guardian_set.keys = keys
        .iter()
        .map(|k| guardian_address_to_hex(&k.address()))
        .collect();
    config.network.listen_addr = "127.0.0.1:0".to_string();
    config.network.reconnect_delay_secs = 0;
    config.storage.db_type = "memory".to_string();
    config
}

fn message(sequence: u64) -> MessagePublication {
    MessagePublication {
        tx_hash: [0x5a; 32],
        timestamp: 1_700_000_123,
        nonce: 42,
        sequence,
        consistency_level: 15,
        emitter_chain: ChainId::ETHEREUM,
        emitter_address: [0x33; 32],
        payload: b"attested payload".to_vec(),
    }
}

struct Network {
    vaas: Vec<mpsc::Receiver<Vaa>>,
    messages: Vec<mpsc::Sender<MessagePublication>>,
    shutdown: watch::Sender<bool>,
    handles: Vec<tokio::task::JoinHandle<Result<(), vigil_node::NodeError>>>,
}

/// Start one node per key, fully meshed.
async fn start_network(keys: &[GuardianKey], running: usize) -> Network {
    let mut nodes = Vec::new();
    for key in &keys[..running] {
        nodes.push(Node::new(node_config(key, keys)).await.unwrap());
    }
    let addrs: Vec<String> = nodes
        .iter()
        .map(|n| n.local_addr().unwrap().to_string())
        .collect();
    for (i, node) in nodes.iter_mut().enumerate() {
        for (j, addr) in addrs.iter().enumerate() {
            if i != j {
                node.add_peer(addr.clone());
            }
        }
    }

    let (shutdown, shutdown_rx) = watch::channel(false);
    let mut network = Network {
        vaas: Vec::new(),
        messages: Vec::new(),
        shutdown,
        handles: Vec::new(),
    };
    for (i, mut node) in nodes.into_iter().enumerate() {
        network.vaas.push(node.subscribe_vaas(&format!("test-{i}"), 16));
        network.messages.push(node.message_sender());
        network.handles.push(tokio::spawn(node.run(shutdown_rx.clone())));
    }
    network
}

/// VAAs published by any node. A node that receives a peer's quorum VAA
/// before reaching quorum itself stores it without publishing, so waits for
/// the first one and then briefly for the rest.
async fn collect_vaas(receivers: &mut [mpsc::Receiver<Vaa>]) -> Vec<Vaa> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while out.is_empty() && tokio::time::Instant::now() < deadline {
        for rx in receivers.iter_mut() {
            while let Ok(vaa) = rx.try_recv() {
                out.push(vaa);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!out.is_empty(), "timed out waiting for VAA");

    tokio::time::sleep(Duration::from_millis(300)).await;
    for rx in receivers.iter_mut() {
        while let Ok(vaa) = rx.try_recv() {
            out.push(vaa);
        }
    }
    out
}

#[tokio::test]
async fn test_guardians_reach_quorum_over_tcp() {
    let keys = guardian_keys(3);
    let gs = GuardianSet::new(
        GUARDIAN_SET_INDEX,
        keys.iter().map(GuardianKey::address).collect(),
    );
    let mut network = start_network(&keys, 3).await;

    let msg = message(77);
    for tx in &network.messages {
        tx.send(msg.clone()).await.unwrap();
    }

    let published = collect_vaas(&mut network.vaas).await;
    assert!(published.len() <= keys.len());
    for vaa in &published {
        assert_eq!(vaa.message_id(), msg.message_id());
        assert_eq!(vaa.guardian_set_index, GUARDIAN_SET_INDEX);
        assert_eq!(vaa.signatures.len(), gs.quorum());
        verify_signatures(vaa, &gs).unwrap();
    }
    // Deterministic signatures: whoever assembled it, the VAA is the same.
    assert!(published.windows(2).all(|w| w[0] == w[1]));

    network.shutdown.send(true).unwrap();
    for handle in network.handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("node did not stop")
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_quorum_tolerates_offline_guardian() {
    // Four guardians need three signatures; the fourth never starts.
    let keys = guardian_keys(4);
    let gs = GuardianSet::new(
        GUARDIAN_SET_INDEX,
        keys.iter().map(GuardianKey::address).collect(),
    );
    let mut network = start_network(&keys, 3).await;

    let msg = message(78);
    for tx in &network.messages {
        tx.send(msg.clone()).await.unwrap();
    }
    for vaa in collect_vaas(&mut network.vaas).await {
        assert_eq!(vaa.signatures.len(), 3);
        verify_signatures(&vaa, &gs).unwrap();
        assert!(vaa.signatures.iter().all(|s| s.index < 3));
    }

    network.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_no_vaa_without_quorum() {
    let keys = guardian_keys(3);
    let mut network = start_network(&keys, 3).await;

    // Only one guardian observes the message.
    network.messages[0].send(message(79)).await.unwrap();
    let res = tokio::time::timeout(Duration::from_millis(500), network.vaas[0].recv()).await;
    assert!(res.is_err(), "VAA published without quorum");

    network.shutdown.send(true).unwrap();
}
