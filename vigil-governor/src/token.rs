use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vigil_types::chain::ChainId;
use vigil_types::primitives::{Address, Timestamp};

/// Identifies a governed asset by where it originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKey {
    pub chain: ChainId,
    pub addr: Address,
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, hex::encode(self.addr))
    }
}

/// Pricing data for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEntry {
    pub symbol: String,
    pub coin_gecko_id: String,
    pub decimals: u8,
    /// Configured floor price.
    pub cfg_price: f64,
    /// Last price reported by the price source, if any.
    pub coin_gecko_price: Option<f64>,
    /// Effective price: `max(cfg_price, coin_gecko_price)`.
    pub price: f64,
    pub price_updated_at: Option<Timestamp>,
}

impl TokenEntry {
    pub fn new(symbol: impl Into<String>, coin_gecko_id: impl Into<String>, decimals: u8, cfg_price: f64) -> Self {
        let mut entry = Self {
            symbol: symbol.into(),
            coin_gecko_id: coin_gecko_id.into(),
            decimals,
            cfg_price,
            coin_gecko_price: None,
            price: cfg_price,
            price_updated_at: None,
        };
        entry.update_price();
        entry
    }

    /// Recompute the effective price. A depressed market price never lowers
    /// it below the configured floor.
    pub fn update_price(&mut self) {
        self.price = match self.coin_gecko_price {
            Some(live) if live > self.cfg_price => live,
            _ => self.cfg_price,
        };
    }

    pub fn set_coin_gecko_price(&mut self, price: f64, now: Timestamp) {
        self.coin_gecko_price = Some(price);
        self.price_updated_at = Some(now);
        self.update_price();
    }
}

/// Token prices shared between the governor (reader) and the price poller
/// (writer). The only lock in the governor.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    inner: Arc<RwLock<HashMap<TokenKey, TokenEntry>>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: entries are replaced whole.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TokenKey, TokenEntry>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TokenKey, TokenEntry>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, key: TokenKey, entry: TokenEntry) {
        self.write().insert(key, entry);
    }

    pub fn get(&self, key: &TokenKey) -> Option<TokenEntry> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &TokenKey) -> bool {
        self.read().contains_key(key)
    }

    /// `(decimals, effective price)` for a token.
    pub fn pricing(&self, key: &TokenKey) -> Option<(u8, f64)> {
        self.read().get(key).map(|e| (e.decimals, e.price))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Distinct, non-empty price source ids, sorted.
    pub fn coin_gecko_ids(&self) -> Vec<String> {
        self.read()
            .values()
            .filter(|e| !e.coin_gecko_id.is_empty())
            .map(|e| e.coin_gecko_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Apply fetched prices to every token sharing each id. Non-finite and
    /// non-positive prices are ignored. Returns the number of entries updated.
    pub fn apply_prices(&self, prices: &HashMap<String, f64>, now: Timestamp) -> usize {
        let mut updated = 0;
        let mut table = self.write();
        for (key, entry) in table.iter_mut() {
            let Some(&price) = prices.get(&entry.coin_gecko_id) else {
                continue;
            };
            if !price.is_finite() || price <= 0.0 {
                tracing::warn!(token = %key, symbol = %entry.symbol, price, "ignoring invalid price");
                continue;
            }
            entry.set_coin_gecko_price(price, now);
            updated += 1;
        }
        updated
    }
}
