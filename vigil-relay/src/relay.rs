use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use vigil_types::gossip::GossipMessage;

use crate::codec::{encode_message, framed, GossipFramed};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::fanout::{DropCounter, DropPolicy, Fanout};
use crate::router::InboundRouter;

/// TCP gossip transport: accepts frames from peers and pushes our own gossip
/// to every configured peer.
pub struct Relay {
    config: RelayConfig,
    router: Arc<InboundRouter>,
    listener: TcpListener,
    dropped: DropCounter,
}

impl Relay {
    /// Bind the listener. Binding eagerly lets callers learn the actual port.
    pub async fn bind(config: RelayConfig, router: InboundRouter) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.listen_addr).await.map_err(|e| {
            RelayError::NetworkError {
                reason: format!("failed to bind {}: {}", config.listen_addr, e),
            }
        })?;
        Ok(Self {
            config,
            router: Arc::new(router),
            listener,
            dropped: DropCounter::default(),
        })
    }

    /// Outbound messages dropped across all peers (full queue or peer down).
    pub fn dropped(&self) -> DropCounter {
        self.dropped.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Push gossip to `peer` as well. Only effective before [`Relay::run`].
    pub fn add_peer(&mut self, peer: impl Into<String>) {
        let peer = peer.into();
        if !self.config.peers.contains(&peer) {
            self.config.peers.push(peer);
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.config.peers
    }

    /// Run until `shutdown` flips. `outbound` carries gossip produced by the
    /// processor; it is fanned out to one writer task per peer.
    pub async fn run(
        self,
        outbound: mpsc::Receiver<GossipMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        let Relay {
            config,
            router,
            listener,
            dropped,
        } = self;

        let mut fanout = Fanout::new("gossip", outbound);
        for peer in &config.peers {
            let rx = fanout.add_sink_with_counter(
                peer.clone(),
                config.peer_queue_size,
                DropPolicy::DropNewest,
                dropped.clone(),
            );
            tokio::spawn(peer_writer(
                peer.clone(),
                rx,
                dropped.clone(),
                config.max_frame_size,
                config.reconnect_delay,
            ));
        }
        let fanout_task = tokio::spawn(fanout.run());

        info!(
            listen_addr = %config.listen_addr,
            peers = config.peers.len(),
            "gossip relay started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("gossip relay shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "accepted peer connection");
                        tokio::spawn(serve_connection(
                            stream,
                            addr,
                            router.clone(),
                            config.max_frame_size,
                        ));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
            }
        }

        fanout_task.abort();
        Ok(())
    }
}

/// Read frames from one peer until it disconnects or sends garbage framing.
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Arc<InboundRouter>,
    max_frame_size: usize,
) {
    let mut frames = framed(stream, max_frame_size);
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(body) => {
                if let Err(e) = router.dispatch(&body) {
                    debug!(%addr, error = %e, "dropping inbound gossip");
                }
            }
            Err(e) => {
                warn!(%addr, error = %e, "closing peer connection");
                return;
            }
        }
    }
    debug!(%addr, "peer disconnected");
}

/// Deliver queued gossip to one peer, reconnecting as needed. A message that
/// cannot be delivered is dropped; the next one triggers a reconnect once
/// `reconnect_delay` has elapsed.
async fn peer_writer(
    peer: String,
    mut rx: mpsc::Receiver<GossipMessage>,
    dropped: DropCounter,
    max_frame_size: usize,
    reconnect_delay: Duration,
) {
    let mut conn: Option<GossipFramed<TcpStream>> = None;
    let mut next_attempt = tokio::time::Instant::now();

    while let Some(msg) = rx.recv().await {
        let frame = match encode_message(&msg, max_frame_size) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%peer, error = %e, kind = msg.kind(), "failed to encode gossip");
                continue;
            }
        };

        if conn.is_none() {
            if tokio::time::Instant::now() < next_attempt {
                dropped.increment();
                continue;
            }
            match TcpStream::connect(&peer).await {
                Ok(stream) => {
                    info!(%peer, "connected to peer");
                    conn = Some(framed(stream, max_frame_size));
                }
                Err(e) => {
                    warn!(%peer, error = %e, "failed to connect to peer");
                    next_attempt = tokio::time::Instant::now() + reconnect_delay;
                    dropped.increment();
                    continue;
                }
            }
        }

        if let Some(frames) = conn.as_mut() {
            if let Err(e) = frames.send(frame).await {
                warn!(%peer, error = %e, "failed to write gossip, reconnecting");
                conn = None;
                next_attempt = tokio::time::Instant::now() + reconnect_delay;
                dropped.increment();
            }
        }
    }
    debug!(%peer, "peer writer stopped");
}
