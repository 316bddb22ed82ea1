use crate::models::BacktestSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of a single simulated round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_pct: f64,
    pub holding_period_minutes: i64,
}

impl TradeRecord {
    pub fn new(
        entry_time: DateTime<Utc>,
        entry_price: f64,
        exit_time: DateTime<Utc>,
        exit_price: f64,
    ) -> Self {
        let pnl_pct = if entry_price > 0.0 {
            (exit_price - entry_price) / entry_price * 100.0
        } else {
            0.0
        };

        Self {
            entry_time,
            exit_time,
            entry_price,
            exit_price,
            pnl_pct,
            holding_period_minutes: (exit_time - entry_time).num_minutes(),
        }
    }
}

/// Per-strategy backtest performance.
///
/// Profits are percentages of the entry price so strategies can be compared
/// without a notional portfolio size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub strategy_name: String,

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    // P&L Distribution
    pub avg_profit_pct: f64,
    pub total_profit_pct: f64,
    pub largest_win: f64,
    pub largest_loss: f64,

    // Risk Metrics
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    pub avg_holding_period_minutes: f64,

    // A position still open at the end of the series
    pub open_at_end: bool,

    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    /// Calculate metrics from closed trades
    pub fn from_trades(strategy_name: &str, trades: Vec<TradeRecord>, open_at_end: bool) -> Self {
        let total_trades = trades.len();

        if total_trades == 0 {
            return Self::empty(strategy_name, open_at_end);
        }

        let winning_trades = trades.iter().filter(|t| t.pnl_pct > 0.0).count();
        let losing_trades = total_trades - winning_trades;
        let win_rate = winning_trades as f64 / total_trades as f64 * 100.0;

        let total_profit_pct: f64 = trades.iter().map(|t| t.pnl_pct).sum();
        let avg_profit_pct = total_profit_pct / total_trades as f64;

        let largest_win = trades
            .iter()
            .map(|t| t.pnl_pct)
            .filter(|p| *p > 0.0)
            .fold(0.0, f64::max);
        let largest_loss = trades
            .iter()
            .map(|t| t.pnl_pct)
            .filter(|p| *p <= 0.0)
            .fold(0.0, f64::min);

        let avg_holding_period_minutes = trades
            .iter()
            .map(|t| t.holding_period_minutes)
            .sum::<i64>() as f64
            / total_trades as f64;

        Self {
            strategy_name: strategy_name.to_string(),
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            avg_profit_pct,
            total_profit_pct,
            largest_win,
            largest_loss,
            max_drawdown_pct: Self::calculate_drawdown(&trades),
            sharpe_ratio: Self::calculate_sharpe_ratio(&trades),
            avg_holding_period_minutes,
            open_at_end,
            trades,
        }
    }

    /// Empty metrics for when no trades closed
    fn empty(strategy_name: &str, open_at_end: bool) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            avg_profit_pct: 0.0,
            total_profit_pct: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: 0.0,
            avg_holding_period_minutes: 0.0,
            open_at_end,
            trades: vec![],
        }
    }

    /// Compact form attached to a SignalResult
    pub fn summary(&self) -> BacktestSummary {
        BacktestSummary {
            closed_trades: self.total_trades,
            win_rate: self.win_rate,
            average_profit: self.avg_profit_pct,
            total_profit: self.total_profit_pct,
            max_drawdown: self.max_drawdown_pct,
            sharpe_ratio: self.sharpe_ratio,
        }
    }

    /// Maximum peak-to-trough drop of compounded equity, in percent
    fn calculate_drawdown(trades: &[TradeRecord]) -> f64 {
        let mut equity = 1.0;
        let mut peak = 1.0;
        let mut max_dd: f64 = 0.0;

        for trade in trades {
            equity *= 1.0 + trade.pnl_pct / 100.0;
            peak = f64::max(peak, equity);
            if peak > 0.0 {
                max_dd = max_dd.max((peak - equity) / peak * 100.0);
            }
        }

        max_dd
    }

    /// Calculate Sharpe ratio (simplified)
    /// Assumes risk-free rate of 0 for simplicity
    fn calculate_sharpe_ratio(trades: &[TradeRecord]) -> f64 {
        if trades.is_empty() {
            return 0.0;
        }

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;

        let variance = returns
            .iter()
            .map(|r| {
                let diff = r - mean_return;
                diff * diff
            })
            .sum::<f64>()
            / returns.len() as f64;

        let std_dev = variance.sqrt();

        if std_dev > 0.0 {
            mean_return / std_dev
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn trade(entry: f64, exit: f64) -> TradeRecord {
        let t0 = Utc::now();
        TradeRecord::new(t0, entry, t0 + Duration::minutes(60), exit)
    }

    #[test]
    fn test_empty_metrics_are_zero_not_nan() {
        let metrics = BacktestMetrics::from_trades("rsi", vec![], true);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.avg_profit_pct, 0.0);
        assert!(metrics.open_at_end);

        let summary = metrics.summary();
        assert_eq!(summary.closed_trades, 0);
        assert!(!summary.win_rate.is_nan());
        assert!(!summary.average_profit.is_nan());
    }

    #[test]
    fn test_win_rate_and_profit() {
        let trades = vec![trade(100.0, 110.0), trade(100.0, 95.0), trade(100.0, 120.0), trade(100.0, 100.0)];
        let metrics = BacktestMetrics::from_trades("rsi", trades, false);

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 2);
        assert!((metrics.win_rate - 50.0).abs() < 1e-9);
        assert!((metrics.total_profit_pct - 25.0).abs() < 1e-9);
        assert!((metrics.avg_profit_pct - 6.25).abs() < 1e-9);
        assert!((metrics.largest_win - 20.0).abs() < 1e-9);
        assert!((metrics.largest_loss + 5.0).abs() < 1e-9);
        assert_eq!(metrics.avg_holding_period_minutes, 60.0);
    }

    #[test]
    fn test_drawdown_compounds() {
        // +10%, -20%: peak 1.10, trough 0.88
        let trades = vec![trade(100.0, 110.0), trade(100.0, 80.0)];
        let metrics = BacktestMetrics::from_trades("rsi", trades, false);
        assert!((metrics.max_drawdown_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_entry_price_is_zero_pnl() {
        let record = trade(0.0, 5.0);
        assert_eq!(record.pnl_pct, 0.0);
    }
}
