use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observation of a token's market
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Lookback horizons used for aggregate price changes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Horizon {
    M30,
    H1,
    H2,
    H4,
    H8,
    H24,
}

impl Horizon {
    pub const ALL: [Horizon; 6] = [
        Horizon::M30,
        Horizon::H1,
        Horizon::H2,
        Horizon::H4,
        Horizon::H8,
        Horizon::H24,
    ];

    pub fn duration(&self) -> Duration {
        match self {
            Horizon::M30 => Duration::minutes(30),
            Horizon::H1 => Duration::hours(1),
            Horizon::H2 => Duration::hours(2),
            Horizon::H4 => Duration::hours(4),
            Horizon::H8 => Duration::hours(8),
            Horizon::H24 => Duration::hours(24),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Horizon::M30 => "30m",
            Horizon::H1 => "1h",
            Horizon::H2 => "2h",
            Horizon::H4 => "4h",
            Horizon::H8 => "8h",
            Horizon::H24 => "24h",
        }
    }
}

/// Immutable per-cycle snapshot of a token's history (oldest first)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub token_address: String,
    pub samples: Vec<PriceSample>,
    pub market_cap: f64,
    pub liquidity: f64,
}

impl PriceSeries {
    pub fn new(token_address: impl Into<String>, samples: Vec<PriceSample>) -> Self {
        Self {
            token_address: token_address.into(),
            samples,
            market_cap: 0.0,
            liquidity: 0.0,
        }
    }

    pub fn with_market(mut self, market_cap: f64, liquidity: f64) -> Self {
        self.market_cap = market_cap;
        self.liquidity = liquidity;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.last()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.latest().map(|s| s.price).filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Percent change from the newest sample at or before `latest - horizon`
    /// to the latest sample. None when history doesn't reach back that far.
    pub fn price_change_pct(&self, horizon: Horizon) -> Option<f64> {
        let latest = self.latest()?;
        let cutoff = latest.timestamp - horizon.duration();

        let base = self
            .samples
            .iter()
            .rev()
            .find(|s| s.timestamp <= cutoff)?;

        if base.price <= 0.0 {
            return None;
        }

        Some((latest.price - base.price) / base.price * 100.0)
    }
}

/// Trading signal from a single strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Indicator family a strategy belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyCategory {
    Momentum,
    Trend,
}

/// Backtest summary attached to a signal when requested
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestSummary {
    pub closed_trades: usize,
    pub win_rate: f64,
    pub average_profit: f64,
    pub total_profit: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

/// One strategy's verdict for one evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalResult {
    pub strategy_name: String,
    pub category: StrategyCategory,
    pub should_buy: bool,
    pub should_sell: bool,
    pub backtest: Option<BacktestSummary>,
}

/// Trading action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
        };
        f.write_str(s)
    }
}

/// Derived decision for one token; never persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradePlan {
    pub token_address: String,
    pub action: TradeAction,
    pub buy_percentage: f64,
    pub sell_percentage: f64,
    pub reasoning: Vec<String>,
}

impl TradePlan {
    /// Replace the action, keeping the vote percentages and appending why
    pub fn overridden(mut self, action: TradeAction, reason: impl Into<String>) -> Self {
        self.action = action;
        self.reasoning.push(reason.into());
        self
    }
}

/// Market context captured alongside each side of a trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub price: f64,
    pub market_cap: f64,
    pub liquidity: f64,
}

/// Durable outcome of one round trip on a token.
///
/// Created on buy with the sell side empty, closed in place on sell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradePerformanceRecord {
    pub id: Uuid,
    pub token_address: String,
    pub recommender_id: String,
    pub buy_price: f64,
    pub buy_amount: f64, // tokens held
    pub buy_timestamp: DateTime<Utc>,
    pub buy_value_usd: f64,
    pub buy_market_cap: f64,
    pub buy_liquidity: f64,
    pub sell_price: Option<f64>,
    pub sell_amount: Option<f64>,
    pub sell_timestamp: Option<DateTime<Utc>>,
    pub sell_value_usd: Option<f64>,
    pub profit_usd: Option<f64>,
    pub profit_percent: Option<f64>,
    pub market_cap_change: Option<f64>,
    pub liquidity_change: Option<f64>,
    pub rapid_dump: bool,
    pub provisional: bool, // synthesized from an untracked balance
}

impl TradePerformanceRecord {
    pub fn open(
        token_address: &str,
        recommender_id: &str,
        buy_amount: f64,
        buy_value_usd: f64,
        market: MarketSnapshot,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_address: token_address.to_string(),
            recommender_id: recommender_id.to_string(),
            buy_price: market.price,
            buy_amount,
            buy_timestamp: timestamp,
            buy_value_usd,
            buy_market_cap: market.market_cap,
            buy_liquidity: market.liquidity,
            sell_price: None,
            sell_amount: None,
            sell_timestamp: None,
            sell_value_usd: None,
            profit_usd: None,
            profit_percent: None,
            market_cap_change: None,
            liquidity_change: None,
            rapid_dump: false,
            provisional: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.sell_timestamp.is_none()
    }

    /// Fill the sell side and compute the round-trip outcome
    pub fn close(
        &mut self,
        sell_amount: f64,
        sell_value_usd: f64,
        market: MarketSnapshot,
        timestamp: DateTime<Utc>,
        rapid_dump: bool,
    ) {
        let profit_usd = sell_value_usd - self.buy_value_usd;
        let profit_percent = if self.buy_value_usd > 0.0 {
            profit_usd / self.buy_value_usd * 100.0
        } else {
            0.0
        };

        self.sell_price = Some(market.price);
        self.sell_amount = Some(sell_amount);
        self.sell_timestamp = Some(timestamp);
        self.sell_value_usd = Some(sell_value_usd);
        self.profit_usd = Some(profit_usd);
        self.profit_percent = Some(profit_percent);
        self.market_cap_change = Some(market.market_cap - self.buy_market_cap);
        self.liquidity_change = Some(market.liquidity - self.buy_liquidity);
        self.rapid_dump = rapid_dump;
    }

    /// Fractional price move since entry (0.10 = +10%)
    pub fn unrealized_return(&self, current_price: f64) -> f64 {
        if self.buy_price <= 0.0 {
            return 0.0;
        }
        (current_price - self.buy_price) / self.buy_price
    }

    /// Derived position view with absolute stop and target prices
    pub fn position(&self, stop_loss_pct: f64, take_profit_pct: f64) -> Position {
        Position {
            token_address: self.token_address.clone(),
            entry_price: self.buy_price,
            size: self.buy_amount,
            stop_loss: self.buy_price * (1.0 - stop_loss_pct),
            take_profit: self.buy_price * (1.0 + take_profit_pct),
            open_timestamp: self.buy_timestamp,
            status: if self.is_open() {
                PositionStatus::Open
            } else {
                PositionStatus::Closed
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Position in a token, computed from its trade record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub token_address: String,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub open_timestamp: DateTime<Utc>,
    pub status: PositionStatus,
}
