//! Per-token position state machine.
//!
//! NONE -> OPEN on `buy`, OPEN -> CLOSED on `sell`, and NONE -> OPEN
//! (provisional) on `recover_untracked`. Every read and write goes through
//! the `TradeGateway`; nothing here caches position state.

use super::exits::ExitReason;
use crate::api::{
    Notifier, SimulationAction, TradeEvent, TradeExecutor, TradeRequest, TradeSimulator, Wallet,
};
use crate::error::{EngineError, StoreError};
use crate::models::{MarketSnapshot, TradePerformanceRecord};
use crate::persistence::TradeGateway;
use crate::risk::{ActionLimiter, RateCategory};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

pub const RECOVERED_RECOMMENDER: &str = "recovered";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub take_profit_pct: f64, // fraction of entry, 0.25 = +25%
    pub stop_loss_pct: f64,
    pub rapid_dump_pct: f64, // 30m drop that forces an exit
    pub reentry_cooldown_secs: i64,
    pub dust_threshold: f64, // token units
    pub min_trade_size: f64, // quote units
    pub max_trade_size: f64,
    pub position_size_pct: f64, // fraction of quote balance per entry
    pub slippage_bps: u16,
    pub recommender_id: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: 0.25,
            stop_loss_pct: 0.10,
            rapid_dump_pct: 0.20,
            reentry_cooldown_secs: 600,
            dust_threshold: 0.0001,
            min_trade_size: 10.0,
            max_trade_size: 500.0,
            position_size_pct: 0.05,
            slippage_bps: 100,
            recommender_id: "consensus".to_string(),
        }
    }
}

/// Why a transition was refused before any side effect
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    PositionOpen,
    Cooldown { remaining_secs: i64 },
    InsufficientBalance { balance: f64, minimum: f64 },
    RateLimited,
    SimulationRejected(String),
    Dust { amount: f64 },
    NoOpenPosition,
    InvalidPrice,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::PositionOpen => write!(f, "position already open"),
            Rejection::Cooldown { remaining_secs } => {
                write!(f, "re-entry cooldown active ({}s remaining)", remaining_secs)
            }
            Rejection::InsufficientBalance { balance, minimum } => write!(
                f,
                "balance {:.2} below minimum trade size {:.2}",
                balance, minimum
            ),
            Rejection::RateLimited => write!(f, "entry rate limit reached"),
            Rejection::SimulationRejected(reason) => write!(f, "simulation rejected: {}", reason),
            Rejection::Dust { amount } => write!(f, "position of {} is dust, not selling", amount),
            Rejection::NoOpenPosition => write!(f, "no open position"),
            Rejection::InvalidPrice => write!(f, "no valid market price"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Opened(TradePerformanceRecord),
    Closed {
        record: TradePerformanceRecord,
        reason: ExitReason,
    },
    Rejected(Rejection),
    /// Execution was attempted and failed; no state changed
    ExecutionFailed(String),
}

pub struct PositionLifecycle {
    gateway: TradeGateway,
    executor: Arc<dyn TradeExecutor>,
    simulator: Arc<dyn TradeSimulator>,
    wallet: Arc<dyn Wallet>,
    notifier: Arc<dyn Notifier>,
    limits: Arc<dyn ActionLimiter>,
    config: LifecycleConfig,
}

impl PositionLifecycle {
    pub fn new(
        gateway: TradeGateway,
        executor: Arc<dyn TradeExecutor>,
        simulator: Arc<dyn TradeSimulator>,
        wallet: Arc<dyn Wallet>,
        notifier: Arc<dyn Notifier>,
        limits: Arc<dyn ActionLimiter>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            gateway,
            executor,
            simulator,
            wallet,
            notifier,
            limits,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn gateway(&self) -> &TradeGateway {
        &self.gateway
    }

    /// Quote amount to spend, or None when the balance can't cover a minimum trade
    pub fn trade_size(&self, balance: f64) -> Option<f64> {
        if !balance.is_finite() || balance < self.config.min_trade_size {
            return None;
        }
        let size = (balance * self.config.position_size_pct)
            .clamp(self.config.min_trade_size, self.config.max_trade_size);
        Some(size.min(balance))
    }

    /// Seconds left before `token_address` may be re-entered
    pub async fn cooldown_remaining(
        &self,
        token_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        let Some(last) = self.gateway.latest_closed_record(token_address).await? else {
            return Ok(None);
        };
        let Some(sold_at) = last.sell_timestamp else {
            return Ok(None);
        };

        let ready_at = sold_at + Duration::seconds(self.config.reentry_cooldown_secs);
        if now < ready_at {
            Ok(Some((ready_at - now).num_seconds().max(1)))
        } else {
            Ok(None)
        }
    }

    /// NONE -> OPEN
    pub async fn buy(
        &self,
        token_address: &str,
        market: MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, EngineError> {
        if !(market.price.is_finite() && market.price > 0.0) {
            return Ok(self.reject(token_address, Rejection::InvalidPrice));
        }

        if self.gateway.open_record(token_address).await?.is_some() {
            return Ok(self.reject(token_address, Rejection::PositionOpen));
        }

        if let Some(remaining_secs) = self.cooldown_remaining(token_address, now).await? {
            return Ok(self.reject(token_address, Rejection::Cooldown { remaining_secs }));
        }

        let balance = self.wallet.quote_balance().await?;
        let Some(amount) = self.trade_size(balance) else {
            return Ok(self.reject(
                token_address,
                Rejection::InsufficientBalance {
                    balance,
                    minimum: self.config.min_trade_size,
                },
            ));
        };

        if self.limits.is_exhausted(RateCategory::Entry) {
            return Ok(self.reject(token_address, Rejection::RateLimited));
        }

        let simulation = self.simulator.simulate(token_address, amount).await?;
        if simulation.recommended_action != SimulationAction::Execute {
            return Ok(self.reject(
                token_address,
                Rejection::SimulationRejected(simulation.reason),
            ));
        }

        // Re-check right before the side effect
        if self.gateway.open_record(token_address).await?.is_some() {
            return Ok(self.reject(token_address, Rejection::PositionOpen));
        }

        // Budget is spent only on entries that reach execution
        if !self.limits.check(RateCategory::Entry) {
            return Ok(self.reject(token_address, Rejection::RateLimited));
        }

        let request = TradeRequest {
            token_address: token_address.to_string(),
            amount,
            is_sell: false,
            slippage_bps: self.config.slippage_bps,
            expected_price: market.price,
        };
        let outcome = self.executor.execute_trade(&request).await?;
        if !outcome.success {
            let error = outcome.error.unwrap_or_else(|| "unknown execution error".into());
            tracing::warn!(token = %token_address, "Buy execution failed: {}", error);
            return Ok(TransitionOutcome::ExecutionFailed(error));
        }

        let tokens = outcome.filled_amount.unwrap_or(amount / market.price);
        let record = TradePerformanceRecord::open(
            token_address,
            &self.config.recommender_id,
            tokens,
            amount,
            market,
            now,
        );

        if let Err(e) = self.gateway.insert_open_record(&record).await {
            tracing::error!(
                token = %token_address,
                "Buy executed ({:?}) but record insert failed: {}",
                outcome.signature,
                e
            );
            return Err(e.into());
        }

        tracing::info!(
            token = %token_address,
            "📈 BUY {:.6} tokens for ${:.2} @ ${:.8}",
            tokens,
            amount,
            market.price
        );

        self.notify(TradeEvent::PositionOpened {
            record: record.clone(),
        })
        .await;

        Ok(TransitionOutcome::Opened(record))
    }

    /// OPEN -> CLOSED, selling the full recorded size
    pub async fn sell(
        &self,
        token_address: &str,
        market: MarketSnapshot,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, EngineError> {
        let Some(mut record) = self.gateway.open_record(token_address).await? else {
            return Ok(self.reject(token_address, Rejection::NoOpenPosition));
        };

        if record.buy_amount < self.config.dust_threshold {
            return Ok(self.reject(
                token_address,
                Rejection::Dust {
                    amount: record.buy_amount,
                },
            ));
        }

        if !(market.price.is_finite() && market.price > 0.0) {
            return Ok(self.reject(token_address, Rejection::InvalidPrice));
        }

        let request = TradeRequest {
            token_address: token_address.to_string(),
            amount: record.buy_amount,
            is_sell: true,
            slippage_bps: self.config.slippage_bps,
            expected_price: market.price,
        };
        let outcome = self.executor.execute_trade(&request).await?;
        if !outcome.success {
            let error = outcome.error.unwrap_or_else(|| "unknown execution error".into());
            tracing::warn!(token = %token_address, "Sell execution failed: {}", error);
            return Ok(TransitionOutcome::ExecutionFailed(error));
        }

        let proceeds = outcome
            .filled_amount
            .unwrap_or(record.buy_amount * market.price);
        record.close(
            record.buy_amount,
            proceeds,
            market,
            now,
            reason == ExitReason::RapidDump,
        );

        if let Err(e) = self.gateway.close_record(&record).await {
            tracing::error!(
                token = %token_address,
                "Sell executed ({:?}) but record close failed: {}",
                outcome.signature,
                e
            );
            return Err(e.into());
        }

        tracing::info!(
            token = %token_address,
            "📉 SELL ({}) {:.6} tokens for ${:.2}, P&L ${:.2} ({:+.2}%)",
            reason,
            record.buy_amount,
            proceeds,
            record.profit_usd.unwrap_or(0.0),
            record.profit_percent.unwrap_or(0.0)
        );

        self.notify(TradeEvent::PositionClosed {
            record: record.clone(),
            reason: reason.to_string(),
        })
        .await;

        Ok(TransitionOutcome::Closed { record, reason })
    }

    /// NONE -> OPEN (provisional) for a wallet balance with no record.
    ///
    /// The current price stands in for the unknown entry price, so P&L on
    /// the eventual exit only covers the move since recovery.
    pub async fn recover_untracked(
        &self,
        token_address: &str,
        market: MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<TradePerformanceRecord>, EngineError> {
        if self.gateway.open_record(token_address).await?.is_some() {
            return Ok(None);
        }

        let balance = self.wallet.token_balance(token_address).await?;
        if balance < self.config.dust_threshold || !(market.price.is_finite() && market.price > 0.0)
        {
            return Ok(None);
        }

        let mut record = TradePerformanceRecord::open(
            token_address,
            RECOVERED_RECOMMENDER,
            balance,
            balance * market.price,
            market,
            now,
        );
        record.provisional = true;

        match self.gateway.insert_open_record(&record).await {
            Ok(()) => {}
            // Another cycle got there first
            Err(StoreError::OpenPositionExists(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        tracing::warn!(
            token = %token_address,
            "Recovered untracked balance of {:.6} @ ${:.8} as provisional position",
            balance,
            market.price
        );

        self.notify(TradeEvent::PositionRecovered {
            record: record.clone(),
        })
        .await;

        Ok(Some(record))
    }

    fn reject(&self, token_address: &str, rejection: Rejection) -> TransitionOutcome {
        tracing::info!(token = %token_address, "Transition rejected: {}", rejection);
        TransitionOutcome::Rejected(rejection)
    }

    /// Delivery failures never undo a completed transition
    async fn notify(&self, event: TradeEvent) {
        if !self.limits.check(RateCategory::Notification) {
            tracing::debug!("Notification for {} dropped by rate limit", event.token_address());
            return;
        }
        if let Err(e) = self.notifier.notify(&event).await {
            tracing::warn!("Notification for {} failed: {}", event.token_address(), e);
        }
    }
}
