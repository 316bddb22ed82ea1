use super::MarketDataProvider;
use crate::error::{ServiceError, StoreError};
use crate::models::{PriceSample, PriceSeries};
use crate::persistence::{retry_with_backoff, RedisPriceHistory, RetryPolicy};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEXSCREENER_API_BASE: &str = "https://api.dexscreener.com/latest/dex";
const SERVICE: &str = "dexscreener";

/// Client for DexScreener API
#[derive(Clone)]
pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    chain_id: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    #[serde(default)]
    pairs: Option<Vec<PairData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairData {
    chain_id: String,
    price_usd: Option<String>,
    #[serde(default)]
    volume: VolumeData,
    market_cap: Option<f64>,
    fdv: Option<f64>,
    liquidity: Option<LiquidityData>,
}

#[derive(Debug, Deserialize, Default)]
struct VolumeData {
    #[serde(default)]
    h24: f64,
}

#[derive(Debug, Deserialize)]
struct LiquidityData {
    #[serde(default)]
    usd: f64,
}

/// Latest market view of a token's main pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairSnapshot {
    pub price: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub liquidity: f64,
}

impl DexScreenerClient {
    pub fn new() -> Self {
        Self::with_base_url(DEXSCREENER_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            chain_id: "solana".to_string(),
            retry: RetryPolicy {
                max_retries: 2,
                base_delay_ms: 2000,
                max_delay_ms: 8000,
            },
        }
    }

    pub fn with_chain(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = chain_id.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current snapshot for a token by its mint address.
    ///
    /// Server errors and dropped connections are retried; a 429 is returned
    /// straight away so the scheduler can back off the whole token.
    pub async fn get_snapshot(&self, token_address: &str) -> Result<PairSnapshot, ServiceError> {
        retry_with_backoff(
            &self.retry,
            "dexscreener snapshot",
            |e: &ServiceError| match e {
                ServiceError::Unavailable { .. } => true,
                ServiceError::Http { status, .. } => *status >= 500,
                _ => false,
            },
            move || self.fetch_snapshot_once(token_address),
        )
        .await
    }

    async fn fetch_snapshot_once(&self, token_address: &str) -> Result<PairSnapshot, ServiceError> {
        let url = format!("{}/tokens/{}", self.base_url, token_address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited {
                service: SERVICE.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DexScreenerResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;

        // Prefer the configured chain, most liquid pair first
        let pair = parsed
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.chain_id == self.chain_id)
            .max_by(|a, b| {
                let la = a.liquidity.as_ref().map_or(0.0, |l| l.usd);
                let lb = b.liquidity.as_ref().map_or(0.0, |l| l.usd);
                la.total_cmp(&lb)
            })
            .ok_or_else(|| {
                ServiceError::invalid(SERVICE, format!("no {} pair for {}", self.chain_id, token_address))
            })?;

        let price: f64 = pair
            .price_usd
            .as_deref()
            .ok_or_else(|| ServiceError::invalid(SERVICE, "pair has no USD price"))?
            .parse()
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;

        Ok(PairSnapshot {
            price,
            volume_24h: pair.volume.h24,
            market_cap: pair.market_cap.or(pair.fdv).unwrap_or(0.0),
            liquidity: pair.liquidity.map_or(0.0, |l| l.usd),
        })
    }
}

impl Default for DexScreenerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// DexScreener snapshots accumulated into a Redis-backed rolling history
pub struct LiveMarketData {
    dex: DexScreenerClient,
    history: RedisPriceHistory,
    history_hours: u64,
}

impl LiveMarketData {
    pub fn new(dex: DexScreenerClient, history: RedisPriceHistory, history_hours: u64) -> Self {
        Self {
            dex,
            history,
            history_hours,
        }
    }

    async fn record_and_load(
        &self,
        token_address: &str,
        sample: &PriceSample,
    ) -> Result<Vec<PriceSample>, StoreError> {
        self.history.save_sample(token_address, sample).await?;
        let samples = self.history.load_samples(token_address, self.history_hours).await?;
        self.history
            .cleanup_old(token_address, self.history_hours)
            .await?;
        Ok(samples)
    }
}

#[async_trait]
impl MarketDataProvider for LiveMarketData {
    async fn fetch_token_time_series(
        &self,
        token_address: &str,
    ) -> Result<PriceSeries, ServiceError> {
        let snapshot = self.dex.get_snapshot(token_address).await?;
        let sample = PriceSample {
            timestamp: Utc::now(),
            price: snapshot.price,
            volume: snapshot.volume_24h,
        };

        // Losing history only shortens the series; strategies that need more skip
        let samples = match self.record_and_load(token_address, &sample).await {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => vec![sample],
            Err(e) => {
                tracing::warn!("Price history unavailable for {}: {}", token_address, e);
                vec![sample]
            }
        };

        Ok(PriceSeries::new(token_address, samples)
            .with_market(snapshot.market_cap, snapshot.liquidity))
    }
}
