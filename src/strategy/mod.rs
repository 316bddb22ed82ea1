// Trading strategy module
pub mod evaluator;
pub mod momentum;
pub mod oscillators;
pub mod signals;
pub mod trend;

use crate::models::{PriceSample, Signal, StrategyCategory};

pub use evaluator::StrategyEvaluator;
pub use momentum::MomentumStrategy;
pub use oscillators::{BollingerStrategy, RateOfChangeStrategy, RsiStrategy, StochasticStrategy};
pub use trend::{MacdCrossStrategy, MarketStructureStrategy, SmaCrossStrategy};

/// A single technical-indicator strategy.
///
/// Implementations are pure: the same prefix of samples always yields the
/// same signal, so the evaluator may run them in any order and the
/// backtester can replay them over every prefix of a series.
pub trait IndicatorStrategy: Send + Sync {
    /// Unique name within a registry
    fn name(&self) -> &str;

    fn category(&self) -> StrategyCategory;

    /// Minimum samples the indicator needs
    fn min_samples(&self) -> usize;

    /// Signal for the last sample of `samples` (oldest first).
    /// None when there isn't enough history.
    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal>;
}

/// The default registered strategy set
pub fn default_strategies() -> Vec<Box<dyn IndicatorStrategy>> {
    vec![
        Box::new(RsiStrategy::default()),
        Box::new(StochasticStrategy::default()),
        Box::new(BollingerStrategy::default()),
        Box::new(RateOfChangeStrategy::default()),
        Box::new(MomentumStrategy::default()),
        Box::new(SmaCrossStrategy::default()),
        Box::new(MacdCrossStrategy::default()),
        Box::new(MarketStructureStrategy::default()),
    ]
}

pub(crate) fn closes(samples: &[PriceSample]) -> Vec<f64> {
    samples.iter().map(|s| s.price).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::PriceSample;
    use chrono::{Duration, Utc};

    /// Samples spaced five minutes apart ending now
    pub fn samples_from(prices: &[f64]) -> Vec<PriceSample> {
        let now = Utc::now();
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PriceSample {
                timestamp: now - Duration::minutes((prices.len() - 1 - i) as i64 * 5),
                price,
                volume: 1000.0,
            })
            .collect()
    }
}
