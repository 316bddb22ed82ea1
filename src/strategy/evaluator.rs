use super::{default_strategies, IndicatorStrategy};
use crate::backtest::run_backtest;
use crate::models::{PriceSeries, Signal, SignalResult};

/// Runs the registered strategy set against one token's series
pub struct StrategyEvaluator {
    strategies: Vec<Box<dyn IndicatorStrategy>>,
}

impl StrategyEvaluator {
    pub fn new(strategies: Vec<Box<dyn IndicatorStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_default_strategies() -> Self {
        Self::new(default_strategies())
    }

    pub fn strategies(&self) -> &[Box<dyn IndicatorStrategy>] {
        &self.strategies
    }

    /// One result per strategy that had enough history.
    ///
    /// Skipped strategies are absent from the output, so they drop out of
    /// the consensus denominator.
    pub fn evaluate_all(&self, token_address: &str, series: &PriceSeries) -> Vec<SignalResult> {
        self.evaluate(token_address, series, false)
    }

    /// Same as `evaluate_all` with a forward-walk backtest attached to each result
    pub fn evaluate_with_backtest(
        &self,
        token_address: &str,
        series: &PriceSeries,
    ) -> Vec<SignalResult> {
        self.evaluate(token_address, series, true)
    }

    fn evaluate(&self, token_address: &str, series: &PriceSeries, backtest: bool) -> Vec<SignalResult> {
        let mut results = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            if series.len() < strategy.min_samples() {
                tracing::debug!(
                    "{}: skipping {} ({} samples, needs {})",
                    token_address,
                    strategy.name(),
                    series.len(),
                    strategy.min_samples()
                );
                continue;
            }

            let Some(signal) = strategy.generate_signal(&series.samples) else {
                tracing::debug!("{}: {} produced no signal", token_address, strategy.name());
                continue;
            };

            let backtest = backtest.then(|| run_backtest(strategy.as_ref(), &series.samples).summary());

            results.push(SignalResult {
                strategy_name: strategy.name().to_string(),
                category: strategy.category(),
                should_buy: signal == Signal::Buy,
                should_sell: signal == Signal::Sell,
                backtest,
            });
        }

        tracing::debug!(
            "{}: {}/{} strategies evaluated",
            token_address,
            results.len(),
            self.strategies.len()
        );

        results
    }
}

impl Default for StrategyEvaluator {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}
