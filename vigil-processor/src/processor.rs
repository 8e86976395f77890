use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use vigil_crypto::hash::vaa_signing_digest;
use vigil_crypto::keys::GuardianKey;
use vigil_governor::governor::GovernorSnapshot;
use vigil_governor::ChainGovernor;
use vigil_storage::governor_store::GovernorStore;
use vigil_storage::traits::KvStore;
use vigil_storage::vaa_store::VaaStore;
use vigil_types::gossip::{GossipMessage, SignedObservation, SignedVaaWithQuorum};
use vigil_types::guardian_set::{GuardianSet, GuardianSetState};
use vigil_types::message::MessagePublication;
use vigil_types::observation::Observation;
use vigil_types::primitives::{
    current_timestamp, guardian_address_to_hex, GuardianAddress, Hash, Timestamp,
};
use vigil_types::vaa::Vaa;

use crate::accountant::Accountant;
use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::state::ObservationState;

/// Everything the processor consumes.
pub struct ProcessorInputs {
    pub guardian_sets: mpsc::Receiver<GuardianSet>,
    /// Observations from the local watchers.
    pub messages: mpsc::Receiver<MessagePublication>,
    /// Messages the accountant held back and has now approved.
    pub accountant_released: Option<mpsc::Receiver<MessagePublication>>,
    /// Operator-injected VAAs.
    pub injected: mpsc::Receiver<Vaa>,
    pub observations: mpsc::Receiver<SignedObservation>,
    pub signed_vaas: mpsc::Receiver<SignedVaaWithQuorum>,
}

/// The observation aggregation loop.
///
/// All state is owned by the single task running [`Processor::run`]; the
/// handlers are synchronous and take the current time as an argument.
pub struct Processor {
    pub(crate) config: ProcessorConfig,
    pub(crate) key: GuardianKey,
    pub(crate) our_addr: GuardianAddress,
    pub(crate) gs: Option<Arc<GuardianSet>>,
    pub(crate) guardian_sets: Arc<GuardianSetState>,
    pub(crate) state: HashMap<Hash, ObservationState>,
    /// Observations each guardian failed to sign before settlement.
    pub(crate) misses: HashMap<GuardianAddress, u64>,
    pub(crate) governor: Option<ChainGovernor>,
    pub(crate) accountant: Option<Box<dyn Accountant>>,
    pub(crate) vaa_store: VaaStore<Arc<dyn KvStore>>,
    governor_store: GovernorStore<Arc<dyn KvStore>>,
    gossip_tx: mpsc::Sender<GossipMessage>,
    vaa_tx: mpsc::Sender<Vaa>,
}

impl Processor {
    pub fn new(
        config: ProcessorConfig,
        key: GuardianKey,
        guardian_sets: Arc<GuardianSetState>,
        store: Arc<dyn KvStore>,
        gossip_tx: mpsc::Sender<GossipMessage>,
        vaa_tx: mpsc::Sender<Vaa>,
    ) -> Self {
        let our_addr = key.address();
        Self {
            config,
            key,
            our_addr,
            gs: guardian_sets.get(),
            guardian_sets,
            state: HashMap::new(),
            misses: HashMap::new(),
            governor: None,
            accountant: None,
            vaa_store: VaaStore::new(store.clone()),
            governor_store: GovernorStore::new(store),
            gossip_tx,
            vaa_tx,
        }
    }

    /// Gate publication on `governor`, restoring any state saved by a
    /// previous run.
    pub fn with_governor(mut self, mut governor: ChainGovernor) -> Self {
        match self.governor_store.load_snapshot::<GovernorSnapshot>() {
            Ok(Some(snapshot)) => {
                let chains = governor.restore(snapshot);
                let stats = governor.stats();
                info!(
                    chains,
                    transfers = stats.num_transfers,
                    pending = stats.num_pending,
                    "restored governor state"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load governor state, starting empty"),
        }
        self.governor = Some(governor);
        self
    }

    pub fn with_accountant(mut self, accountant: Box<dyn Accountant>) -> Self {
        self.accountant = Some(accountant);
        self
    }

    pub fn address(&self) -> GuardianAddress {
        self.our_addr
    }

    pub fn governor(&self) -> Option<&ChainGovernor> {
        self.governor.as_ref()
    }

    pub fn observation(&self, digest: &Hash) -> Option<&ObservationState> {
        self.state.get(digest)
    }

    /// Number of digests currently tracked.
    pub fn tracked(&self) -> usize {
        self.state.len()
    }

    pub fn misses(&self, guardian: &GuardianAddress) -> u64 {
        self.misses.get(guardian).copied().unwrap_or(0)
    }

    /// Run until `shutdown` flips to true. Returns an error only for
    /// conditions that must stop the node.
    pub async fn run(
        mut self,
        mut inputs: ProcessorInputs,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ProcessorError> {
        let cleanup_every = self.config.cleanup_interval();
        let mut cleanup = tokio::time::interval_at(Instant::now() + cleanup_every, cleanup_every);
        let governor_every = self.config.governor_interval();
        let mut governor_tick =
            tokio::time::interval_at(Instant::now() + governor_every, governor_every);

        info!(
            guardian = %guardian_address_to_hex(&self.our_addr),
            governor = self.governor.is_some(),
            accountant = self.accountant.is_some(),
            "processor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(gs) = inputs.guardian_sets.recv() => {
                    self.handle_guardian_set(gs, current_timestamp());
                }
                Some(msg) = inputs.messages.recv() => {
                    self.handle_message_publication(msg, current_timestamp())?;
                }
                Some(msg) = recv_optional(&mut inputs.accountant_released) => {
                    self.handle_accountant_release(msg, current_timestamp())?;
                }
                Some(vaa) = inputs.injected.recv() => {
                    self.handle_injection(vaa, current_timestamp())?;
                }
                Some(m) = inputs.observations.recv() => {
                    self.handle_observation(m, current_timestamp())?;
                }
                Some(m) = inputs.signed_vaas.recv() => {
                    self.handle_inbound_signed_vaa(m, current_timestamp());
                }
                _ = cleanup.tick() => {
                    self.handle_cleanup(current_timestamp());
                }
                _ = governor_tick.tick() => {
                    self.handle_governor_tick(current_timestamp())?;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Persist governor state and release the accountant.
    pub fn shutdown(&mut self) {
        if let Some(governor) = &self.governor {
            let snapshot = governor.snapshot();
            match self.governor_store.save_snapshot(&snapshot) {
                Ok(()) => info!(chains = snapshot.chains.len(), "saved governor state"),
                Err(e) => error!(error = %e, "failed to save governor state"),
            }
        }
        if let Some(accountant) = &self.accountant {
            accountant.close();
        }
        info!(tracked = self.state.len(), "processor stopped");
    }

    pub fn handle_guardian_set(&mut self, gs: GuardianSet, now: Timestamp) {
        info!(
            index = gs.index,
            keys = gs.len(),
            quorum = gs.quorum(),
            "guardian set updated"
        );
        let gs = Arc::new(gs);
        self.guardian_sets.set(gs.clone(), now);
        self.gs = Some(gs);
    }

    /// A message reported by a local watcher.
    pub fn handle_message_publication(
        &mut self,
        msg: MessagePublication,
        now: Timestamp,
    ) -> Result<(), ProcessorError> {
        if let Some(governor) = self.governor.as_mut() {
            match governor.process_msg(&msg, now) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                // The target chain rejects a transfer it cannot parse, so
                // signing it releases no value.
                Err(e) => warn!(
                    message_id = %msg.message_id(),
                    error = %e,
                    "governor could not classify message, publishing"
                ),
            }
        }
        if !self.accountant_allows(&msg)? {
            return Ok(());
        }
        self.publish_message(&msg, now)
    }

    /// A message the accountant previously held back. Both gates were
    /// already passed.
    pub fn handle_accountant_release(
        &mut self,
        msg: MessagePublication,
        now: Timestamp,
    ) -> Result<(), ProcessorError> {
        if self.accountant.is_none() {
            return Err(ProcessorError::AccountantNotConfigured);
        }
        debug!(message_id = %msg.message_id(), "accountant released message");
        self.publish_message(&msg, now)
    }

    /// An operator-injected VAA. One that already carries signatures is
    /// treated as finalized: it must hold a quorum of the set that signed it
    /// and is then stored and settled. An unsigned one is signed under the
    /// current guardian set and aggregated like a local observation.
    pub fn handle_injection(&mut self, mut vaa: Vaa, now: Timestamp) -> Result<(), ProcessorError> {
        if !vaa.signatures.is_empty() {
            let message_id = vaa.message_id();
            if self.settle_signed_vaa(vaa, "injected", now) {
                info!(%message_id, "stored injected VAA");
            }
            return Ok(());
        }
        let gs = self.gs.clone().ok_or(ProcessorError::MissingGuardianSet)?;
        vaa.guardian_set_index = gs.index;
        info!(message_id = %vaa.message_id(), "signing injected VAA");
        self.handle_own_observation(Observation::Injected(Box::new(vaa)), None, now)
    }

    /// Release governor-queued transfers that now fit.
    pub fn handle_governor_tick(&mut self, now: Timestamp) -> Result<(), ProcessorError> {
        let released = match self.governor.as_mut() {
            Some(governor) => governor.check_pending(now),
            None => return Ok(()),
        };

        for msg in released {
            let governed = match &self.governor {
                Some(governor) => governor.is_governed_msg(&msg),
                None => Ok(false),
            };
            match governed {
                Ok(true) => {}
                Ok(false) => {
                    return Err(ProcessorError::GovernorBypass {
                        message_id: msg.message_id().to_string(),
                        reason: "released message is not governed".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ProcessorError::GovernorBypass {
                        message_id: msg.message_id().to_string(),
                        reason: e.to_string(),
                    })
                }
            }
            if !self.accountant_allows(&msg)? {
                continue;
            }
            self.publish_message(&msg, now)?;
        }
        Ok(())
    }

    fn accountant_allows(&self, msg: &MessagePublication) -> Result<bool, ProcessorError> {
        let Some(accountant) = &self.accountant else {
            return Ok(true);
        };
        let allowed = accountant.submit_observation(msg)?;
        if !allowed {
            debug!(message_id = %msg.message_id(), "accountant held message");
        }
        Ok(allowed)
    }

    fn publish_message(&mut self, msg: &MessagePublication, now: Timestamp) -> Result<(), ProcessorError> {
        let gs = self.gs.clone().ok_or(ProcessorError::MissingGuardianSet)?;
        let vaa = msg.create_vaa(gs.index);
        self.handle_own_observation(Observation::Message(Box::new(vaa)), Some(msg.tx_hash), now)
    }

    /// Sign our own observation, gossip the signature and check for quorum.
    fn handle_own_observation(
        &mut self,
        obs: Observation,
        tx_hash: Option<Hash>,
        now: Timestamp,
    ) -> Result<(), ProcessorError> {
        let gs = self.gs.clone().ok_or(ProcessorError::MissingGuardianSet)?;
        let digest = signing_digest(&obs);
        let signature = self.key.sign(&digest).map_err(ProcessorError::Signing)?;
        let message_id = obs.message_id();

        let entry = self
            .state
            .entry(digest)
            .or_insert_with(|| ObservationState::new(now, Some(gs.clone())));
        if entry.submitted {
            debug!(%message_id, "already submitted, not signing again");
            return Ok(());
        }

        let signed = SignedObservation {
            addr: self.our_addr,
            hash: digest,
            signature,
            tx_hash: tx_hash.unwrap_or_default(),
            message_id: message_id.to_string(),
        };
        entry.source = obs.source();
        entry.our_observation = Some(obs);
        entry.tx_hash = tx_hash;
        entry.gs = Some(gs);
        entry.signatures.insert(self.our_addr, signature);
        entry.our_msg = Some(signed.clone());

        debug!(
            %message_id,
            digest = %hex::encode(digest),
            signatures = entry.signatures.len(),
            "signed observation"
        );
        self.send_gossip(GossipMessage::SignedObservation(signed));
        self.check_for_quorum(&digest)
    }

    pub(crate) fn send_gossip(&self, msg: GossipMessage) {
        let kind = msg.kind();
        match self.gossip_tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(kind, "gossip channel full, dropping message"),
            Err(TrySendError::Closed(_)) => warn!(kind, "gossip channel closed, dropping message"),
        }
    }

    pub(crate) fn send_vaa(&self, vaa: Vaa) {
        let message_id = vaa.message_id();
        match self.vaa_tx.try_send(vaa) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(%message_id, "downstream VAA channel full, dropping VAA")
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%message_id, "downstream VAA channel closed, dropping VAA")
            }
        }
    }
}

/// The digest a guardian signs for an observation.
pub fn signing_digest(obs: &Observation) -> Hash {
    match obs {
        Observation::Message(vaa) | Observation::Injected(vaa) => vaa_signing_digest(vaa),
    }
}

async fn recv_optional<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
