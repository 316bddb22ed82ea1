use crate::error::StoreError;
use crate::models::PriceSample;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};

/// Compact sample for Redis storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSample {
    price: f64,
    volume: f64,
    timestamp: DateTime<Utc>,
}

/// Redis-backed rolling price history per token
///
/// Uses sorted sets with timestamps as scores for efficient time-range queries
#[derive(Clone)]
pub struct RedisPriceHistory {
    conn: ConnectionManager,
}

impl RedisPriceHistory {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout("Redis connection timeout after 5 seconds".into()))??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(token: &str) -> String {
        format!("prices:{}", token)
    }

    /// Append one sample to `prices:{token}` scored by its timestamp
    pub async fn save_sample(&self, token: &str, sample: &PriceSample) -> Result<(), StoreError> {
        let stored = StoredSample {
            price: sample.price,
            volume: sample.volume,
            timestamp: sample.timestamp,
        };

        let value = serde_json::to_string(&stored)?;
        let score = sample.timestamp.timestamp_millis() as f64;

        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(Self::key(token), value, score).await?;

        Ok(())
    }

    /// Load recent samples, oldest first
    pub async fn load_samples(
        &self,
        token: &str,
        hours_back: u64,
    ) -> Result<Vec<PriceSample>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours_back as i64);
        let min_score = cutoff.timestamp_millis() as f64;

        let mut conn = self.conn.clone();
        let results: Vec<String> = conn.zrangebyscore(Self::key(token), min_score, "+inf").await?;

        let samples = results
            .iter()
            .map(|json| {
                let stored: StoredSample = serde_json::from_str(json)?;
                Ok(PriceSample {
                    timestamp: stored.timestamp,
                    price: stored.price,
                    volume: stored.volume,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        tracing::debug!("Loaded {} historical samples for {} from Redis", samples.len(), token);

        Ok(samples)
    }

    /// Clean up old samples to prevent unbounded growth
    pub async fn cleanup_old(&self, token: &str, keep_hours: u64) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::hours(keep_hours as i64);
        let max_score = cutoff.timestamp_millis() as f64;

        let mut conn = self.conn.clone();
        let removed: usize = conn.zrembyscore(Self::key(token), "-inf", max_score).await?;

        if removed > 0 {
            tracing::debug!("Cleaned up {} old samples for {}", removed, token);
        }

        Ok(removed)
    }

    pub async fn count(&self, token: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let count: usize = conn.zcard(Self::key(token)).await?;
        Ok(count)
    }
}
