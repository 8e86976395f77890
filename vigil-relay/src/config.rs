use std::net::SocketAddr;
use std::time::Duration;

use vigil_types::constants::MAX_FRAME_SIZE;

/// Default gossip port.
pub const DEFAULT_GOSSIP_PORT: u16 = 8999;

/// Configuration for the gossip relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to accept peer connections on.
    pub listen_addr: SocketAddr,
    /// Peers to push our gossip to (`host:port`).
    pub peers: Vec<String>,
    /// Outbound queue per peer; overflow drops the newest message.
    pub peer_queue_size: usize,
    pub max_frame_size: usize,
    /// Wait between reconnection attempts to an unreachable peer.
    pub reconnect_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_GOSSIP_PORT).into(),
            peers: Vec::new(),
            peer_queue_size: 1024,
            max_frame_size: MAX_FRAME_SIZE,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}
