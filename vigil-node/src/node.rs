use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use vigil_governor::coingecko::CoinGeckoSource;
use vigil_governor::prices::PricePoller;
use vigil_governor::ChainGovernor;
use vigil_processor::{Processor, ProcessorInputs};
use vigil_relay::fanout::{DropCounter, DropPolicy, Fanout};
use vigil_relay::relay::Relay;
use vigil_relay::router::{InboundChannels, InboundRouter};
use vigil_storage::memory::MemoryStore;
use vigil_storage::rocksdb::RocksDbStore;
use vigil_storage::traits::KvStore;
use vigil_types::gossip::{GossipMessage, ObservationRequest};
use vigil_types::guardian_set::{GuardianSet, GuardianSetState};
use vigil_types::message::MessagePublication;
use vigil_types::primitives::{current_timestamp, guardian_address_to_hex};
use vigil_types::vaa::Vaa;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;

/// Capacity of the channels between the relay, the watchers and the processor.
const QUEUE_SIZE: usize = 1024;

/// The guardian node: processor, gossip relay, price poller and the VAA
/// fan-out, wired together and run until shutdown.
pub struct Node {
    config: NodeConfig,
    metrics: Arc<NodeMetrics>,
    processor: Processor,
    inputs: ProcessorInputs,
    relay: Relay,
    gossip_rx: mpsc::Receiver<GossipMessage>,
    vaas: Fanout<Vaa>,
    observation_requests: mpsc::Receiver<ObservationRequest>,
    price_poller: Option<PricePoller<CoinGeckoSource>>,
    dropped: Vec<DropCounter>,
    messages_tx: mpsc::Sender<MessagePublication>,
    injected_tx: mpsc::Sender<Vaa>,
    guardian_sets_tx: mpsc::Sender<GuardianSet>,
}

/// Create a storage backend from the node configuration.
fn create_store(config: &NodeConfig) -> Result<Arc<dyn KvStore>, NodeError> {
    match config.storage.db_type.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "rocksdb" => {
            let data_dir = Path::new(&config.storage.data_dir);
            std::fs::create_dir_all(data_dir)?;
            let store = RocksDbStore::open(data_dir.join("vigil.rocksdb"))?;
            Ok(Arc::new(store))
        }
        other => Err(NodeError::ConfigError {
            reason: format!(
                "unknown storage backend '{}', expected 'memory' or 'rocksdb'",
                other
            ),
        }),
    }
}

impl Node {
    /// Build every component and bind the gossip listener.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let key = config.guardian_key()?;
        let gs = config.guardian_set()?.ok_or_else(|| NodeError::ConfigError {
            reason: "guardian_set.keys is empty".to_string(),
        })?;
        let store = create_store(&config)?;
        let guardian_sets = Arc::new(GuardianSetState::default());
        let metrics = Arc::new(NodeMetrics::new());

        let (gossip_tx, gossip_rx) = mpsc::channel(QUEUE_SIZE);
        let (vaa_tx, vaa_rx) = mpsc::channel(QUEUE_SIZE);
        let (guardian_sets_tx, guardian_sets_rx) = mpsc::channel(8);
        let (messages_tx, messages_rx) = mpsc::channel(QUEUE_SIZE);
        let (injected_tx, injected_rx) = mpsc::channel(QUEUE_SIZE);
        let (observations_tx, observations_rx) = mpsc::channel(QUEUE_SIZE);
        let (requests_tx, requests_rx) = mpsc::channel(QUEUE_SIZE);
        let (signed_vaas_tx, signed_vaas_rx) = mpsc::channel(QUEUE_SIZE);

        let mut processor = Processor::new(
            config.processor.clone(),
            key,
            guardian_sets.clone(),
            store,
            gossip_tx,
            vaa_tx,
        );
        if !gs.contains(&processor.address()) {
            warn!(
                guardian = %guardian_address_to_hex(&processor.address()),
                index = gs.index,
                "this node's key is not in the configured guardian set"
            );
        }
        metrics.guardian_set_index.set(i64::from(gs.index));
        processor.handle_guardian_set(gs, current_timestamp());

        let mut price_poller = None;
        if config.governor.enabled {
            let governor = ChainGovernor::new(&config.governor)?;
            if let Some(url) = &config.governor.coin_gecko_url {
                let source = CoinGeckoSource::new(url.clone())?;
                let interval = Duration::from_secs(config.governor.price_poll_interval_secs.max(1));
                price_poller = Some(PricePoller::new(source, governor.prices(), interval));
            }
            processor = processor.with_governor(governor);
        }

        let router = InboundRouter::new(
            InboundChannels {
                observations: observations_tx,
                observation_requests: requests_tx,
                signed_vaas: signed_vaas_tx,
            },
            guardian_sets,
        );
        let router_dropped = router.dropped();
        let relay = Relay::bind(config.relay_config()?, router).await?;
        let dropped = vec![relay.dropped(), router_dropped];

        Ok(Self {
            config,
            metrics,
            processor,
            inputs: ProcessorInputs {
                guardian_sets: guardian_sets_rx,
                messages: messages_rx,
                accountant_released: None,
                injected: injected_rx,
                observations: observations_rx,
                signed_vaas: signed_vaas_rx,
            },
            relay,
            gossip_rx,
            vaas: Fanout::new("vaas", vaa_rx),
            observation_requests: requests_rx,
            price_poller,
            dropped,
            messages_tx,
            injected_tx,
            guardian_sets_tx,
        })
    }

    /// Address the gossip listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.relay.local_addr()?)
    }

    pub fn add_peer(&mut self, peer: impl Into<String>) {
        self.relay.add_peer(peer);
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        self.metrics.clone()
    }

    /// Where watchers deliver observed messages.
    pub fn message_sender(&self) -> mpsc::Sender<MessagePublication> {
        self.messages_tx.clone()
    }

    /// Where operator-injected VAAs enter.
    pub fn injection_sender(&self) -> mpsc::Sender<Vaa> {
        self.injected_tx.clone()
    }

    /// Where guardian set updates enter.
    pub fn guardian_set_sender(&self) -> mpsc::Sender<GuardianSet> {
        self.guardian_sets_tx.clone()
    }

    /// Receive every VAA this node publishes. A consumer that falls
    /// `capacity` behind loses VAAs instead of stalling the others.
    pub fn subscribe_vaas(&mut self, name: &str, capacity: usize) -> mpsc::Receiver<Vaa> {
        let (rx, _) = self.vaas.add_sink(name, capacity, DropPolicy::DropNewest);
        rx
    }

    /// Run until `shutdown` flips to true. A fatal processor error is
    /// returned immediately.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), NodeError> {
        let Node {
            config,
            metrics,
            processor,
            inputs,
            relay,
            gossip_rx,
            mut vaas,
            observation_requests,
            price_poller,
            dropped,
            messages_tx: _messages_tx,
            injected_tx: _injected_tx,
            guardian_sets_tx: _guardian_sets_tx,
        } = self;

        let relay_task = tokio::spawn(relay.run(gossip_rx, shutdown.clone()));

        let (published, _) = vaas.add_sink("metrics", QUEUE_SIZE, DropPolicy::Backpressure);
        tokio::spawn(count_published(published, metrics.clone()));
        tokio::spawn(vaas.run());
        tokio::spawn(log_observation_requests(observation_requests));
        if let Some(poller) = price_poller {
            tokio::spawn(poller.run(shutdown.clone()));
        }
        let stats_every = Duration::from_secs(config.logging.stats_interval_secs.max(1));
        tokio::spawn(report_stats(metrics, dropped, stats_every, shutdown.clone()));

        processor.run(inputs, shutdown).await?;

        match relay_task.await {
            Ok(result) => result?,
            Err(e) => {
                return Err(NodeError::TaskError {
                    reason: format!("relay task failed: {}", e),
                })
            }
        }
        info!("node shutdown complete");
        Ok(())
    }

    /// Run until Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<(), NodeError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received shutdown signal");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    error!(error = %e, "failed to listen for shutdown signal");
                    // The sender stays alive, so the node keeps running.
                    std::future::pending::<()>().await;
                }
            }
        });
        self.run(shutdown_rx).await
    }
}

async fn count_published(mut rx: mpsc::Receiver<Vaa>, metrics: Arc<NodeMetrics>) {
    while let Some(vaa) = rx.recv().await {
        metrics.vaas_published.inc();
        debug!(
            message_id = %vaa.message_id(),
            signatures = vaa.signatures.len(),
            "published VAA"
        );
    }
}

/// No watchers run in this process, so requests are only logged.
async fn log_observation_requests(mut rx: mpsc::Receiver<ObservationRequest>) {
    while let Some(req) = rx.recv().await {
        info!(
            chain = %req.chain_id,
            tx_hash = %hex::encode(req.tx_hash),
            "re-observation requested, no watcher configured for chain"
        );
    }
}

async fn report_stats(
    metrics: Arc<NodeMetrics>,
    dropped: Vec<DropCounter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let total: u64 = dropped.iter().map(DropCounter::get).sum();
                metrics.gossip_dropped.set(i64::try_from(total).unwrap_or(i64::MAX));
                info!(
                    vaas_published = metrics.vaas_published.get(),
                    gossip_dropped = total,
                    "node stats"
                );
                match metrics.encode() {
                    Ok(text) => debug!(metrics = %text, "metrics snapshot"),
                    Err(e) => warn!(error = %e, "failed to encode metrics"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
