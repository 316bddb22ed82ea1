use super::{
    signals::{analyze_market_conditions, SignalConfig},
    IndicatorStrategy,
};
use crate::models::{PriceSample, Signal, StrategyCategory};

/// Momentum-based swing strategy
///
/// Combines several confirmations into one vote:
/// - RSI for overbought/oversold conditions
/// - Moving average crossovers for trend direction
/// - Volume analysis for confirmation
/// - Flash-crash entries on capitulation volume
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    config: SignalConfig,
}

impl MomentumStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl IndicatorStrategy for MomentumStrategy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Momentum
    }

    fn min_samples(&self) -> usize {
        // Longest indicator (long MA) plus a buffer
        self.config.long_ma_period + 5
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        if samples.len() < self.min_samples() {
            return None;
        }

        let prices: Vec<f64> = samples.iter().map(|s| s.price).collect();
        let volumes: Vec<f64> = samples.iter().map(|s| s.volume).collect();

        analyze_market_conditions(&prices, &volumes, &self.config)
    }
}
