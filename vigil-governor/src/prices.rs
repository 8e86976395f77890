use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vigil_types::primitives::{current_timestamp, Timestamp};

use crate::error::GovernorError;
use crate::token::PriceTable;

/// A source of USD prices keyed by price-source id.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(&self, ids: &[String]) -> Result<HashMap<String, f64>, GovernorError>;
}

/// Periodically refreshes a [`PriceTable`] from a [`PriceSource`].
pub struct PricePoller<S: PriceSource> {
    source: S,
    table: PriceTable,
    interval: Duration,
}

impl<S: PriceSource> PricePoller<S> {
    pub fn new(source: S, table: PriceTable, interval: Duration) -> Self {
        Self {
            source,
            table,
            interval,
        }
    }

    /// Fetch once and apply. On failure the previous prices stay in effect.
    pub async fn refresh_once(&self, now: Timestamp) -> Result<usize, GovernorError> {
        let ids = self.table.coin_gecko_ids();
        if ids.is_empty() {
            return Ok(0);
        }
        let prices = match self.source.fetch_prices(&ids).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "price refresh failed, keeping previous prices");
                return Err(e);
            }
        };
        for id in ids.iter().filter(|id| !prices.contains_key(*id)) {
            debug!(id = %id, "no price returned");
        }
        let updated = self.table.apply_prices(&prices, now);
        debug!(requested = ids.len(), updated, "prices refreshed");
        Ok(updated)
    }

    /// Poll until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "price poller started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.refresh_once(current_timestamp()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("price poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TokenEntry, TokenKey};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vigil_types::chain::ChainId;

    struct MockSource {
        prices: HashMap<String, f64>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PriceSource for MockSource {
        async fn fetch_prices(
            &self,
            _ids: &[String],
        ) -> Result<HashMap<String, f64>, GovernorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GovernorError::PriceFetch {
                    reason: "unreachable".to_string(),
                });
            }
            Ok(self.prices.clone())
        }
    }

    fn key() -> TokenKey {
        TokenKey {
            chain: ChainId::ETHEREUM,
            addr: [7u8; 32],
        }
    }

    fn table() -> PriceTable {
        let table = PriceTable::new();
        table.insert(key(), TokenEntry::new("WETH", "weth", 8, 1000.0));
        table
    }

    fn poller(prices: &[(&str, f64)], fail: bool) -> (PricePoller<MockSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = MockSource {
            prices: prices.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            fail,
            calls: calls.clone(),
        };
        (
            PricePoller::new(source, table(), Duration::from_secs(60)),
            calls,
        )
    }

    #[tokio::test]
    async fn test_refresh_applies_higher_price() {
        let (p, _) = poller(&[("weth", 2000.0)], false);
        assert_eq!(p.refresh_once(100).await.unwrap(), 1);
        assert_eq!(p.table.pricing(&key()), Some((8, 2000.0)));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_prices() {
        let (p, calls) = poller(&[], true);
        assert!(p.refresh_once(100).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.table.pricing(&key()), Some((8, 1000.0)));
    }

    #[tokio::test]
    async fn test_empty_table_skips_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = MockSource {
            prices: HashMap::new(),
            fail: false,
            calls: calls.clone(),
        };
        let p = PricePoller::new(source, PriceTable::new(), Duration::from_secs(60));
        assert_eq!(p.refresh_once(100).await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let (p, calls) = poller(&[("weth", 1500.0)], false);
        let table = p.table.clone();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(p.run(rx));

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Immediate tick plus two more.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(table.pricing(&key()), Some((8, 1500.0)));
    }
}
