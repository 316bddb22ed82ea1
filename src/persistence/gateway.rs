use super::retry::{retry_with_backoff, RetryPolicy};
use super::TradeStore;
use crate::error::StoreError;
use crate::models::TradePerformanceRecord;
use std::sync::Arc;

/// Single entry point for trade-record I/O.
///
/// Every call goes through bounded retry on transient store errors;
/// permanent errors (constraint violations, corrupt rows) return at once.
#[derive(Clone)]
pub struct TradeGateway {
    store: Arc<dyn TradeStore>,
    policy: RetryPolicy,
}

impl TradeGateway {
    pub fn new(store: Arc<dyn TradeStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn open_record(
        &self,
        token_address: &str,
    ) -> Result<Option<TradePerformanceRecord>, StoreError> {
        let store = &self.store;
        retry_with_backoff(&self.policy, "find open record", StoreError::is_transient, move || {
            store.find_open(token_address)
        })
        .await
    }

    pub async fn latest_closed_record(
        &self,
        token_address: &str,
    ) -> Result<Option<TradePerformanceRecord>, StoreError> {
        let store = &self.store;
        retry_with_backoff(&self.policy, "find closed record", StoreError::is_transient, move || {
            store.find_latest_closed(token_address)
        })
        .await
    }

    pub async fn open_records(&self) -> Result<Vec<TradePerformanceRecord>, StoreError> {
        let store = &self.store;
        retry_with_backoff(&self.policy, "list open records", StoreError::is_transient, move || {
            store.list_open()
        })
        .await
    }

    pub async fn records_for_token(
        &self,
        token_address: &str,
    ) -> Result<Vec<TradePerformanceRecord>, StoreError> {
        let store = &self.store;
        retry_with_backoff(&self.policy, "list token records", StoreError::is_transient, move || {
            store.list_for_token(token_address)
        })
        .await
    }

    pub async fn insert_open_record(
        &self,
        record: &TradePerformanceRecord,
    ) -> Result<(), StoreError> {
        let store = &self.store;
        retry_with_backoff(&self.policy, "insert trade record", StoreError::is_transient, move || {
            store.insert_open(record)
        })
        .await
    }

    pub async fn close_record(&self, record: &TradePerformanceRecord) -> Result<(), StoreError> {
        let store = &self.store;
        retry_with_backoff(&self.policy, "close trade record", StoreError::is_transient, move || {
            store.close(record)
        })
        .await
    }
}
