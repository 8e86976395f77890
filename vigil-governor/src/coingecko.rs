use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::GovernorError;
use crate::prices::PriceSource;

pub const DEFAULT_COIN_GECKO_URL: &str = "https://api.coingecko.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    usd: f64,
}

/// Price source backed by the CoinGecko `simple/price` endpoint.
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GovernorError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GovernorError::PriceFetch {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL for a single query covering every id.
    pub fn query_url(&self, ids: &[String]) -> String {
        format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            ids.join(",")
        )
    }
}

/// Parse a `simple/price` response body. Ids with no `usd` field are skipped.
pub fn parse_response(body: &[u8]) -> Result<HashMap<String, f64>, GovernorError> {
    let raw: HashMap<String, serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| GovernorError::PriceFetch {
            reason: format!("invalid response: {e}"),
        })?;
    Ok(raw
        .into_iter()
        .filter_map(|(id, v)| {
            serde_json::from_value::<CoinGeckoPrice>(v)
                .ok()
                .map(|p| (id, p.usd))
        })
        .collect())
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch_prices(&self, ids: &[String]) -> Result<HashMap<String, f64>, GovernorError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.query_url(ids);
        debug!(%url, "querying prices");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GovernorError::PriceFetch {
                reason: format!("request failed: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GovernorError::PriceFetch {
                reason: format!("unexpected status {status}"),
            });
        }
        let body = response.bytes().await.map_err(|e| GovernorError::PriceFetch {
            reason: format!("failed to read body: {e}"),
        })?;
        parse_response(&body)
    }
}
