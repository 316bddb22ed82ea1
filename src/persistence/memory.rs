use super::TradeStore;
use crate::error::StoreError;
use crate::models::TradePerformanceRecord;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local trade store used for paper trading and tests
#[derive(Default)]
pub struct InMemoryTradeStore {
    records: RwLock<Vec<TradePerformanceRecord>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn find_open(
        &self,
        token_address: &str,
    ) -> Result<Option<TradePerformanceRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.token_address == token_address && r.is_open())
            .cloned())
    }

    async fn find_latest_closed(
        &self,
        token_address: &str,
    ) -> Result<Option<TradePerformanceRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.token_address == token_address && !r.is_open())
            .max_by_key(|r| r.sell_timestamp)
            .cloned())
    }

    async fn list_open(&self) -> Result<Vec<TradePerformanceRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.is_open()).cloned().collect())
    }

    async fn list_for_token(
        &self,
        token_address: &str,
    ) -> Result<Vec<TradePerformanceRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .iter()
            .filter(|r| r.token_address == token_address)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.buy_timestamp.cmp(&a.buy_timestamp));
        Ok(matching)
    }

    async fn insert_open(&self, record: &TradePerformanceRecord) -> Result<(), StoreError> {
        // Check and insert under one write lock
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.token_address == record.token_address && r.is_open())
        {
            return Err(StoreError::OpenPositionExists(record.token_address.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn close(&self, record: &TradePerformanceRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let existing = records
            .iter_mut()
            .find(|r| r.id == record.id && r.is_open())
            .ok_or_else(|| StoreError::NotFound(record.id.to_string()))?;
        *existing = record.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketSnapshot;
    use chrono::{Duration, Utc};

    fn market(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            price,
            market_cap: 1_000_000.0,
            liquidity: 100_000.0,
        }
    }

    fn open_record(token: &str) -> TradePerformanceRecord {
        TradePerformanceRecord::open(token, "engine", 10.0, 100.0, market(10.0), Utc::now())
    }

    #[tokio::test]
    async fn test_second_open_rejected() {
        let store = InMemoryTradeStore::new();
        store.insert_open(&open_record("TOKEN")).await.unwrap();

        let err = store.insert_open(&open_record("TOKEN")).await.unwrap_err();
        assert_eq!(err, StoreError::OpenPositionExists("TOKEN".into()));

        // Other tokens are independent
        store.insert_open(&open_record("OTHER")).await.unwrap();
        assert_eq!(store.list_open().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let store = InMemoryTradeStore::new();
        let mut record = open_record("TOKEN");
        store.insert_open(&record).await.unwrap();

        record.close(10.0, 120.0, market(12.0), Utc::now(), false);
        store.close(&record).await.unwrap();

        assert!(store.find_open("TOKEN").await.unwrap().is_none());
        let closed = store.find_latest_closed("TOKEN").await.unwrap().unwrap();
        assert_eq!(closed.profit_usd, Some(20.0));

        store.insert_open(&open_record("TOKEN")).await.unwrap();
        assert_eq!(store.list_for_token("TOKEN").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_double_close_is_not_found() {
        let store = InMemoryTradeStore::new();
        let mut record = open_record("TOKEN");
        store.insert_open(&record).await.unwrap();

        record.close(10.0, 90.0, market(9.0), Utc::now(), false);
        store.close(&record).await.unwrap();

        let err = store.close(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_latest_closed_by_sell_time() {
        let store = InMemoryTradeStore::new();
        let now = Utc::now();

        let mut first = open_record("TOKEN");
        store.insert_open(&first).await.unwrap();
        first.close(10.0, 100.0, market(10.0), now - Duration::hours(2), false);
        store.close(&first).await.unwrap();

        let mut second = open_record("TOKEN");
        store.insert_open(&second).await.unwrap();
        second.close(10.0, 100.0, market(10.0), now, false);
        store.close(&second).await.unwrap();

        let latest = store.find_latest_closed("TOKEN").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }
}
