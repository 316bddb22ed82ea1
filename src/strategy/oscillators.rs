//! Single-indicator momentum oscillators.
//!
//! Each strategy looks only at the terminal value of its indicator and
//! votes buy below its lower band, sell above its upper band.

use super::{closes, IndicatorStrategy};
use crate::indicators::{calculate_bollinger, calculate_roc, calculate_rsi, calculate_stochastic_k};
use crate::models::{PriceSample, Signal, StrategyCategory};

fn band_signal(value: f64, lower: f64, upper: f64) -> Signal {
    if value < lower {
        Signal::Buy
    } else if value > upper {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// RSI oversold/overbought
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiStrategy {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl IndicatorStrategy for RsiStrategy {
    fn name(&self) -> &str {
        "rsi"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Momentum
    }

    fn min_samples(&self) -> usize {
        self.period + 1
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        let rsi = calculate_rsi(&closes(samples), self.period)?;
        Some(band_signal(rsi, self.oversold, self.overbought))
    }
}

/// Stochastic %K on closes
#[derive(Debug, Clone)]
pub struct StochasticStrategy {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for StochasticStrategy {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 20.0,
            overbought: 80.0,
        }
    }
}

impl IndicatorStrategy for StochasticStrategy {
    fn name(&self) -> &str {
        "stochastic"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Momentum
    }

    fn min_samples(&self) -> usize {
        self.period
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        let k = calculate_stochastic_k(&closes(samples), self.period)?;
        Some(band_signal(k, self.oversold, self.overbought))
    }
}

/// Price outside Bollinger Bands
#[derive(Debug, Clone)]
pub struct BollingerStrategy {
    pub period: usize,
    pub std_devs: f64,
}

impl Default for BollingerStrategy {
    fn default() -> Self {
        Self {
            period: 20,
            std_devs: 2.0,
        }
    }
}

impl IndicatorStrategy for BollingerStrategy {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Momentum
    }

    fn min_samples(&self) -> usize {
        self.period
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        let prices = closes(samples);
        let bands = calculate_bollinger(&prices, self.period, self.std_devs)?;
        let price = *prices.last()?;
        Some(band_signal(price, bands.lower, bands.upper))
    }
}

/// Rate of change over `period` samples.
///
/// Unlike the mean-reverting oscillators this one follows the move:
/// a strong rise is a buy, a strong fall is a sell.
#[derive(Debug, Clone)]
pub struct RateOfChangeStrategy {
    pub period: usize,
    pub threshold_pct: f64,
}

impl Default for RateOfChangeStrategy {
    fn default() -> Self {
        Self {
            period: 12,
            threshold_pct: 5.0,
        }
    }
}

impl IndicatorStrategy for RateOfChangeStrategy {
    fn name(&self) -> &str {
        "rate_of_change"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Momentum
    }

    fn min_samples(&self) -> usize {
        self.period + 1
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        let roc = calculate_roc(&closes(samples), self.period)?;
        let signal = if roc >= self.threshold_pct {
            Signal::Buy
        } else if roc <= -self.threshold_pct {
            Signal::Sell
        } else {
            Signal::Hold
        };
        Some(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::samples_from;

    fn oversold_series() -> Vec<f64> {
        let mut prices: Vec<f64> = (0..15)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        prices.push(90.0);
        prices
    }

    #[test]
    fn test_rsi_buys_when_oversold() {
        let strategy = RsiStrategy::default();
        let signal = strategy.generate_signal(&samples_from(&oversold_series()));
        assert_eq!(signal, Some(Signal::Buy));
    }

    #[test]
    fn test_rsi_sells_when_overbought() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let signal = RsiStrategy::default().generate_signal(&samples_from(&prices));
        assert_eq!(signal, Some(Signal::Sell));
    }

    #[test]
    fn test_rsi_skips_short_series() {
        let prices = vec![100.0; 14];
        assert!(RsiStrategy::default()
            .generate_signal(&samples_from(&prices))
            .is_none());
    }

    #[test]
    fn test_stochastic_bands() {
        let strategy = StochasticStrategy::default();

        let mut falling: Vec<f64> = (0..14).map(|i| 100.0 + (i % 3) as f64).collect();
        falling.push(95.0);
        assert_eq!(strategy.generate_signal(&samples_from(&falling)), Some(Signal::Buy));

        let mut rising: Vec<f64> = (0..14).map(|i| 100.0 + (i % 3) as f64).collect();
        rising.push(110.0);
        assert_eq!(strategy.generate_signal(&samples_from(&rising)), Some(Signal::Sell));

        let flat = vec![100.0; 14];
        assert_eq!(strategy.generate_signal(&samples_from(&flat)), Some(Signal::Hold));
    }

    #[test]
    fn test_bollinger_breakdown_buys() {
        let mut prices: Vec<f64> = (0..19)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        prices.push(90.0);

        let signal = BollingerStrategy::default().generate_signal(&samples_from(&prices));
        assert_eq!(signal, Some(Signal::Buy));
    }

    #[test]
    fn test_bollinger_inside_bands_holds() {
        let prices: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();

        let signal = BollingerStrategy::default().generate_signal(&samples_from(&prices));
        assert_eq!(signal, Some(Signal::Hold));
    }

    #[test]
    fn test_rate_of_change_follows_move() {
        let strategy = RateOfChangeStrategy::default();

        let up: Vec<f64> = (0..13).map(|i| 100.0 + i as f64).collect();
        assert_eq!(strategy.generate_signal(&samples_from(&up)), Some(Signal::Buy));

        let down: Vec<f64> = (0..13).map(|i| 100.0 - i as f64).collect();
        assert_eq!(strategy.generate_signal(&samples_from(&down)), Some(Signal::Sell));

        let flat = vec![100.0; 13];
        assert_eq!(strategy.generate_signal(&samples_from(&flat)), Some(Signal::Hold));
    }
}
