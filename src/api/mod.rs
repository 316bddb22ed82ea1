//! External collaborators: market data, swap simulation and execution,
//! wallet balances, trust signals and notifications.
//!
//! The engine only sees the traits below; concrete clients live in the
//! submodules.

pub mod dexscreener;
pub mod jupiter;
pub mod notify;
pub mod paper;
pub mod trust;

use crate::error::ServiceError;
use crate::models::{PriceSeries, TradePerformanceRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use dexscreener::{DexScreenerClient, LiveMarketData, PairSnapshot};
pub use jupiter::JupiterSimulator;
pub use notify::LogNotifier;
pub use paper::PaperAccount;
pub use trust::{DenyListTrust, NoTrustSignal};

/// Fetches the current time series for one token
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_token_time_series(&self, token_address: &str)
        -> Result<PriceSeries, ServiceError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SimulationAction {
    Execute,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub recommended_action: SimulationAction,
    pub price_impact_pct: f64,
    pub reason: String,
}

impl SimulationResult {
    pub fn execute(price_impact_pct: f64) -> Self {
        Self {
            recommended_action: SimulationAction::Execute,
            price_impact_pct,
            reason: "route available".to_string(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            recommended_action: SimulationAction::Reject,
            price_impact_pct: 0.0,
            reason: reason.into(),
        }
    }
}

/// Dry-runs a buy of `amount` quote units before committing
#[async_trait]
pub trait TradeSimulator: Send + Sync {
    async fn simulate(&self, token_address: &str, amount: f64)
        -> Result<SimulationResult, ServiceError>;
}

/// One swap against the quote asset.
///
/// `amount` is quote units on a buy and token units on a sell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRequest {
    pub token_address: String,
    pub amount: f64,
    pub is_sell: bool,
    pub slippage_bps: u16,
    pub expected_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
    // Tokens received on a buy, quote received on a sell
    pub filled_amount: Option<f64>,
}

impl ExecutionOutcome {
    pub fn filled(signature: impl Into<String>, filled_amount: f64) -> Self {
        Self {
            success: true,
            signature: Some(signature.into()),
            error: None,
            filled_amount: Some(filled_amount),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            signature: None,
            error: Some(error.into()),
            filled_amount: None,
        }
    }
}

#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute_trade(&self, request: &TradeRequest) -> Result<ExecutionOutcome, ServiceError>;
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Spendable quote-asset balance
    async fn quote_balance(&self) -> Result<f64, ServiceError>;

    async fn token_balance(&self, token_address: &str) -> Result<f64, ServiceError>;
}

/// Whether a token (or whoever recommended it) should be exited at once
#[async_trait]
pub trait TrustEvaluator: Send + Sync {
    async fn is_compromised(&self, token_address: &str) -> Result<bool, ServiceError>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TradeEvent {
    PositionOpened {
        record: TradePerformanceRecord,
    },
    PositionClosed {
        record: TradePerformanceRecord,
        reason: String,
    },
    PositionRecovered {
        record: TradePerformanceRecord,
    },
}

impl TradeEvent {
    pub fn token_address(&self) -> &str {
        match self {
            TradeEvent::PositionOpened { record }
            | TradeEvent::PositionClosed { record, .. }
            | TradeEvent::PositionRecovered { record } => &record.token_address,
        }
    }
}

/// Fire-and-forget delivery of trade events
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &TradeEvent) -> anyhow::Result<()>;
}
