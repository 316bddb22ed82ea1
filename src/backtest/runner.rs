use crate::backtest::metrics::{BacktestMetrics, TradeRecord};
use crate::models::{PriceSample, Signal};
use crate::strategy::IndicatorStrategy;

/// Walk a strategy forward over every prefix of `samples`.
///
/// Long-only: a buy opens a simulated position when flat, a sell closes it.
/// A position still open at the end is reported but not counted.
pub fn run_backtest(strategy: &dyn IndicatorStrategy, samples: &[PriceSample]) -> BacktestMetrics {
    let mut trades = Vec::new();
    let mut entry: Option<&PriceSample> = None;

    for end in strategy.min_samples().max(1)..=samples.len() {
        let Some(signal) = strategy.generate_signal(&samples[..end]) else {
            continue;
        };
        let current = &samples[end - 1];

        match (signal, entry) {
            (Signal::Buy, None) => entry = Some(current),
            (Signal::Sell, Some(open)) => {
                trades.push(TradeRecord::new(
                    open.timestamp,
                    open.price,
                    current.timestamp,
                    current.price,
                ));
                entry = None;
            }
            _ => {}
        }
    }

    tracing::debug!(
        "Backtest {}: {} samples, {} closed trades",
        strategy.name(),
        samples.len(),
        trades.len()
    );

    BacktestMetrics::from_trades(strategy.name(), trades, entry.is_some())
}
