use serde::{Deserialize, Serialize};

/// Default rolling window: 24 hours.
pub const DEFAULT_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Default interval between price refreshes.
pub const DEFAULT_PRICE_POLL_SECS: u64 = 5 * 60;

/// Governor configuration, the `[governor]` section of the node config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub enabled: bool,
    /// Length of the rolling window in seconds.
    pub window_secs: u64,
    pub chains: Vec<ChainLimitConfig>,
    pub tokens: Vec<TokenConfig>,
    pub price_poll_interval_secs: u64,
    /// Base URL of a CoinGecko-compatible price API. Unset disables polling
    /// and the configured floor prices are used as-is.
    pub coin_gecko_url: Option<String>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: DEFAULT_WINDOW_SECS,
            chains: Vec::new(),
            tokens: Vec::new(),
            price_poll_interval_secs: DEFAULT_PRICE_POLL_SECS,
            coin_gecko_url: None,
        }
    }
}

/// A governed chain: its token bridge emitter and daily USD limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLimitConfig {
    pub chain: u16,
    /// Hex address of the token bridge emitter on this chain.
    pub emitter_address: String,
    pub daily_limit: u64,
}

/// A priced token, identified by its origin chain and address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub chain: u16,
    pub address: String,
    pub symbol: String,
    pub coin_gecko_id: String,
    pub decimals: u8,
    /// Floor price in USD. The live price is only used when higher.
    pub price: f64,
}
