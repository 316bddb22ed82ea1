use super::lifecycle::LifecycleConfig;
use crate::models::TradePerformanceRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    RapidDump,
    Compromised,
    Recommendation, // Consensus sell
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "take profit",
            ExitReason::StopLoss => "stop loss",
            ExitReason::RapidDump => "rapid dump",
            ExitReason::Compromised => "compromised",
            ExitReason::Recommendation => "sell recommendation",
        };
        f.write_str(s)
    }
}

/// Hard exit for an open record, checked before any strategy vote.
///
/// A compromised token goes first regardless of P&L, then the stop-loss,
/// the 30-minute rapid dump and finally the profit target.
pub fn evaluate_exit(
    record: &TradePerformanceRecord,
    current_price: f64,
    change_30m_pct: Option<f64>,
    compromised: bool,
    config: &LifecycleConfig,
) -> Option<ExitReason> {
    if compromised {
        return Some(ExitReason::Compromised);
    }

    let unrealized = record.unrealized_return(current_price);

    if unrealized <= -config.stop_loss_pct {
        return Some(ExitReason::StopLoss);
    }

    if let Some(change) = change_30m_pct {
        if change / 100.0 <= -config.rapid_dump_pct {
            return Some(ExitReason::RapidDump);
        }
    }

    if unrealized >= config.take_profit_pct {
        return Some(ExitReason::TakeProfit);
    }

    None
}
