use std::collections::{BTreeMap, VecDeque};

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::{debug, info, warn};
use vigil_types::chain::ChainId;
use vigil_types::constants::MAX_BRIDGE_DECIMALS;
use vigil_types::message::MessagePublication;
use vigil_types::primitives::{address_from_hex, Address, Timestamp};
use vigil_types::token::{is_transfer, TransferPayloadHdr};

use crate::config::GovernorConfig;
use crate::error::GovernorError;
use crate::token::{PriceTable, TokenEntry, TokenKey};

/// A transfer counted against a chain's limit.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Transfer {
    /// USD notional value.
    pub value: u64,
    pub timestamp: Timestamp,
}

/// A transfer waiting for capacity.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PendingTransfer {
    pub msg: MessagePublication,
    pub value: u64,
    pub enqueued_at: Timestamp,
}

/// Ledger and queue of one governed chain.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub emitter_chain: ChainId,
    pub emitter_address: Address,
    pub daily_limit: u64,
    transfers: Vec<Transfer>,
    pending: VecDeque<PendingTransfer>,
}

impl ChainEntry {
    fn new(emitter_chain: ChainId, emitter_address: Address, daily_limit: u64) -> Self {
        Self {
            emitter_chain,
            emitter_address,
            daily_limit,
            transfers: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingTransfer> {
        self.pending.iter()
    }
}

/// Persisted governor state for one chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ChainSnapshot {
    pub chain: ChainId,
    pub transfers: Vec<Transfer>,
    pub pending: Vec<PendingTransfer>,
}

/// Persisted governor state, written on shutdown and restored on start.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GovernorSnapshot {
    pub chains: Vec<ChainSnapshot>,
}

/// Aggregate counters across chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorStats {
    pub num_transfers: usize,
    pub value_transferred: u64,
    pub num_pending: usize,
    pub value_pending: u64,
}

/// Drop ledger entries older than `start_time` and return the sum of the rest.
///
/// Trimming an already-trimmed ledger at the same `start_time` is a no-op.
pub fn trim_and_sum_value(transfers: &mut Vec<Transfer>, start_time: Timestamp) -> u64 {
    transfers.retain(|t| t.timestamp >= start_time);
    transfers
        .iter()
        .fold(0u64, |sum, t| sum.saturating_add(t.value))
}

/// USD notional value of `amount` token units, truncated to whole dollars.
pub fn notional_value(amount: f64, decimals: u8, price: f64) -> u64 {
    let decimals = decimals.min(MAX_BRIDGE_DECIMALS);
    let value = amount / 10f64.powi(i32::from(decimals)) * price;
    // `as` saturates and maps NaN to zero.
    value as u64
}

/// Per-chain notional-value rate limiter.
///
/// Owned by the processor task. Only the price table is shared.
#[derive(Debug)]
pub struct ChainGovernor {
    window: u64,
    chains: BTreeMap<ChainId, ChainEntry>,
    prices: PriceTable,
}

impl ChainGovernor {
    pub fn new(config: &GovernorConfig) -> Result<Self, GovernorError> {
        if config.window_secs == 0 {
            return Err(GovernorError::InvalidConfig {
                reason: "window_secs must be positive".to_string(),
            });
        }

        let mut chains = BTreeMap::new();
        for c in &config.chains {
            let chain = ChainId(c.chain);
            let emitter = address_from_hex(&c.emitter_address).map_err(|e| {
                GovernorError::InvalidConfig {
                    reason: format!("chain {chain}: {e}"),
                }
            })?;
            if chains
                .insert(chain, ChainEntry::new(chain, emitter, c.daily_limit))
                .is_some()
            {
                return Err(GovernorError::InvalidConfig {
                    reason: format!("duplicate chain {chain}"),
                });
            }
        }

        let prices = PriceTable::new();
        for t in &config.tokens {
            let key = TokenKey {
                chain: ChainId(t.chain),
                addr: address_from_hex(&t.address).map_err(|e| GovernorError::InvalidConfig {
                    reason: format!("token {}: {e}", t.symbol),
                })?,
            };
            if !t.price.is_finite() || t.price < 0.0 {
                return Err(GovernorError::InvalidConfig {
                    reason: format!("token {}: invalid price {}", t.symbol, t.price),
                });
            }
            if prices.contains(&key) {
                return Err(GovernorError::InvalidConfig {
                    reason: format!("duplicate token {key}"),
                });
            }
            prices.insert(
                key,
                TokenEntry::new(&t.symbol, &t.coin_gecko_id, t.decimals, t.price),
            );
        }

        info!(
            chains = chains.len(),
            tokens = prices.len(),
            window_secs = config.window_secs,
            "chain governor initialized"
        );

        Ok(Self {
            window: config.window_secs,
            chains,
            prices,
        })
    }

    /// Handle to the shared price table, for the price poller.
    pub fn prices(&self) -> PriceTable {
        self.prices.clone()
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn chain(&self, chain: ChainId) -> Option<&ChainEntry> {
        self.chains.get(&chain)
    }

    /// Classify a message. `Ok(None)` means it is not governed; otherwise
    /// returns the chain it counts against and its notional value.
    fn classify(&self, msg: &MessagePublication) -> Result<Option<(ChainId, u64)>, GovernorError> {
        let Some(ce) = self.chains.get(&msg.emitter_chain) else {
            return Ok(None);
        };
        if msg.emitter_address != ce.emitter_address || !is_transfer(&msg.payload) {
            return Ok(None);
        }

        let hdr = TransferPayloadHdr::decode(&msg.payload)?;
        let key = TokenKey {
            chain: hdr.origin_chain,
            addr: hdr.origin_address,
        };
        let Some((decimals, price)) = self.prices.pricing(&key) else {
            debug!(token = %key, msg_id = %msg.message_id(), "transfer of ungoverned token");
            return Ok(None);
        };
        Ok(Some((
            msg.emitter_chain,
            notional_value(hdr.amount_f64(), decimals, price),
        )))
    }

    /// Whether `msg` is subject to the governor.
    pub fn is_governed_msg(&self, msg: &MessagePublication) -> Result<bool, GovernorError> {
        Ok(self.classify(msg)?.is_some())
    }

    /// Decide whether `msg` may be published now.
    ///
    /// Returns `Ok(false)` when the transfer was queued. Once anything is
    /// queued for a chain, every later transfer on that chain queues behind
    /// it. A payload that claims to be a transfer but does not decode is an
    /// error; ungoverned messages are always admitted.
    pub fn process_msg(
        &mut self,
        msg: &MessagePublication,
        now: Timestamp,
    ) -> Result<bool, GovernorError> {
        let Some((chain, value)) = self.classify(msg)? else {
            return Ok(true);
        };
        let start_time = now.saturating_sub(self.window);
        let Some(ce) = self.chains.get_mut(&chain) else {
            return Ok(true);
        };

        // A re-observed message that is already waiting keeps its place.
        if ce.pending.iter().any(|p| &p.msg == msg) {
            debug!(msg_id = %msg.message_id(), "transfer already pending");
            return Ok(false);
        }

        let sum = trim_and_sum_value(&mut ce.transfers, start_time);
        if !ce.pending.is_empty() || sum.saturating_add(value) > ce.daily_limit {
            ce.pending.push_back(PendingTransfer {
                msg: msg.clone(),
                value,
                enqueued_at: now,
            });
            info!(
                chain = %chain,
                msg_id = %msg.message_id(),
                value,
                sum,
                limit = ce.daily_limit,
                pending = ce.pending.len(),
                "governor queued transfer"
            );
            return Ok(false);
        }

        ce.transfers.push(Transfer {
            value,
            timestamp: now,
        });
        debug!(
            chain = %chain,
            msg_id = %msg.message_id(),
            value,
            sum = sum.saturating_add(value),
            "governor admitted transfer"
        );
        Ok(true)
    }

    /// Release queued transfers that now fit, strictly in FIFO order. A
    /// chain's queue is not examined past its first transfer that does not fit.
    pub fn check_pending(&mut self, now: Timestamp) -> Vec<MessagePublication> {
        let start_time = now.saturating_sub(self.window);
        let mut released = Vec::new();

        for (chain, ce) in self.chains.iter_mut() {
            if ce.pending.is_empty() {
                continue;
            }
            let sum = trim_and_sum_value(&mut ce.transfers, start_time);
            let mut available = ce.daily_limit.saturating_sub(sum);

            while let Some(front) = ce.pending.front() {
                if front.value > available {
                    break;
                }
                let Some(pt) = ce.pending.pop_front() else {
                    break;
                };
                available -= pt.value;
                ce.transfers.push(Transfer {
                    value: pt.value,
                    timestamp: now,
                });
                info!(
                    chain = %chain,
                    msg_id = %pt.msg.message_id(),
                    value = pt.value,
                    queued_secs = now.saturating_sub(pt.enqueued_at),
                    "governor released transfer"
                );
                released.push(pt.msg);
            }
        }
        released
    }

    pub fn stats(&self) -> GovernorStats {
        let mut stats = GovernorStats::default();
        for ce in self.chains.values() {
            let s = chain_stats(ce);
            stats.num_transfers += s.num_transfers;
            stats.value_transferred = stats.value_transferred.saturating_add(s.value_transferred);
            stats.num_pending += s.num_pending;
            stats.value_pending = stats.value_pending.saturating_add(s.value_pending);
        }
        stats
    }

    pub fn chain_stats(&self, chain: ChainId) -> Option<GovernorStats> {
        self.chains.get(&chain).map(chain_stats)
    }

    pub fn snapshot(&self) -> GovernorSnapshot {
        GovernorSnapshot {
            chains: self
                .chains
                .values()
                .map(|ce| ChainSnapshot {
                    chain: ce.emitter_chain,
                    transfers: ce.transfers.clone(),
                    pending: ce.pending.iter().cloned().collect(),
                })
                .collect(),
        }
    }

    /// Load persisted state. Chains that are no longer configured are
    /// discarded. Returns the number of chains restored.
    pub fn restore(&mut self, snapshot: GovernorSnapshot) -> usize {
        let mut restored = 0;
        for cs in snapshot.chains {
            let Some(ce) = self.chains.get_mut(&cs.chain) else {
                warn!(
                    chain = %cs.chain,
                    transfers = cs.transfers.len(),
                    pending = cs.pending.len(),
                    "discarding governor state for unconfigured chain"
                );
                continue;
            };
            ce.transfers = cs.transfers;
            ce.pending = cs.pending.into();
            restored += 1;
        }
        restored
    }
}

fn chain_stats(ce: &ChainEntry) -> GovernorStats {
    GovernorStats {
        num_transfers: ce.transfers.len(),
        value_transferred: ce
            .transfers
            .iter()
            .fold(0u64, |s, t| s.saturating_add(t.value)),
        num_pending: ce.pending.len(),
        value_pending: ce
            .pending
            .iter()
            .fold(0u64, |s, p| s.saturating_add(p.value)),
    }
}
