//! Durable trade records and the retrying gateway in front of them.

pub mod gateway;
pub mod memory;
pub mod price_history;
pub mod retry;

use crate::error::StoreError;
use crate::models::TradePerformanceRecord;
use async_trait::async_trait;

pub use gateway::TradeGateway;
pub use memory::InMemoryTradeStore;
pub use price_history::RedisPriceHistory;
pub use retry::{retry_with_backoff, RetryPolicy};

/// Storage for trade performance records.
///
/// Implementations must enforce at most one open record per token and make
/// `close` a conditional update on the record still being open.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// The open record for a token, if any
    async fn find_open(&self, token_address: &str)
        -> Result<Option<TradePerformanceRecord>, StoreError>;

    /// Most recently closed record for a token (by sell timestamp)
    async fn find_latest_closed(
        &self,
        token_address: &str,
    ) -> Result<Option<TradePerformanceRecord>, StoreError>;

    async fn list_open(&self) -> Result<Vec<TradePerformanceRecord>, StoreError>;

    /// Every record for a token, newest buy first
    async fn list_for_token(
        &self,
        token_address: &str,
    ) -> Result<Vec<TradePerformanceRecord>, StoreError>;

    /// Insert a new open record.
    /// Fails with `OpenPositionExists` if the token already has one.
    async fn insert_open(&self, record: &TradePerformanceRecord) -> Result<(), StoreError>;

    /// Write the sell side of a record that is still open.
    /// Fails with `NotFound` if it is missing or already closed.
    async fn close(&self, record: &TradePerformanceRecord) -> Result<(), StoreError>;
}
