//! Reduces per-strategy votes to a single trade plan.

use crate::models::{SignalResult, TradeAction, TradePlan};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BUY_THRESHOLD: f64 = 50.0;
pub const DEFAULT_SELL_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            sell_threshold: DEFAULT_SELL_THRESHOLD,
        }
    }
}

/// Share of evaluated strategies voting each way, in percent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusScore {
    pub buy_percentage: f64,
    pub sell_percentage: f64,
    pub evaluated: usize,
}

/// buy% = 100·B/N and sell% = 100·S/N over the evaluated strategies.
/// No evaluated strategies reports 0/0.
pub fn aggregate(signals: &[SignalResult]) -> ConsensusScore {
    let evaluated = signals.len();
    if evaluated == 0 {
        return ConsensusScore {
            buy_percentage: 0.0,
            sell_percentage: 0.0,
            evaluated: 0,
        };
    }

    let buys = signals.iter().filter(|s| s.should_buy).count();
    let sells = signals.iter().filter(|s| s.should_sell).count();

    ConsensusScore {
        buy_percentage: 100.0 * buys as f64 / evaluated as f64,
        sell_percentage: 100.0 * sells as f64 / evaluated as f64,
        evaluated,
    }
}

/// Compare the score against the thresholds.
///
/// Buy is checked first, so when both thresholds are met the plan buys.
pub fn generate_trade_plan(
    token_address: &str,
    score: &ConsensusScore,
    buy_threshold: f64,
    sell_threshold: f64,
) -> TradePlan {
    let mut reasoning = Vec::new();

    let action = if score.evaluated == 0 {
        reasoning.push("No strategies had enough data to vote".to_string());
        TradeAction::Hold
    } else if score.buy_percentage >= buy_threshold {
        reasoning.push(format!(
            "Buy consensus {:.1}% of {} strategies meets threshold {:.1}%",
            score.buy_percentage, score.evaluated, buy_threshold
        ));
        TradeAction::Buy
    } else if score.sell_percentage >= sell_threshold {
        reasoning.push(format!(
            "Sell consensus {:.1}% of {} strategies meets threshold {:.1}%",
            score.sell_percentage, score.evaluated, sell_threshold
        ));
        TradeAction::Sell
    } else {
        reasoning.push(format!(
            "No consensus: buy {:.1}% (needs {:.1}%), sell {:.1}% (needs {:.1}%)",
            score.buy_percentage, buy_threshold, score.sell_percentage, sell_threshold
        ));
        TradeAction::Hold
    };

    TradePlan {
        token_address: token_address.to_string(),
        action,
        buy_percentage: score.buy_percentage,
        sell_percentage: score.sell_percentage,
        reasoning,
    }
}
