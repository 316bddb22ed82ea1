use super::{closes, IndicatorStrategy};
use crate::indicators::{
    analyze_market_structure, calculate_macd_series, calculate_sma,
    calculate_volume_direction_ratio, macd, MarketStructure,
};
use crate::models::{PriceSample, Signal, StrategyCategory};

/// Short/long simple moving average crossover
#[derive(Debug, Clone)]
pub struct SmaCrossStrategy {
    pub short_period: usize,
    pub long_period: usize,
}

impl Default for SmaCrossStrategy {
    fn default() -> Self {
        Self {
            short_period: 10,
            long_period: 20,
        }
    }
}

impl IndicatorStrategy for SmaCrossStrategy {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Trend
    }

    fn min_samples(&self) -> usize {
        self.long_period
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        let prices = closes(samples);
        let short = calculate_sma(&prices, self.short_period)?;
        let long = calculate_sma(&prices, self.long_period)?;
        let price = *prices.last()?;

        // Price has to confirm the cross
        let signal = if short > long && price > short {
            Signal::Buy
        } else if short < long && price < short {
            Signal::Sell
        } else {
            Signal::Hold
        };
        Some(signal)
    }
}

/// MACD line crossing its signal line on the latest sample
#[derive(Debug, Clone)]
pub struct MacdCrossStrategy {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdCrossStrategy {
    fn default() -> Self {
        Self {
            fast: macd::DEFAULT_FAST,
            slow: macd::DEFAULT_SLOW,
            signal: macd::DEFAULT_SIGNAL,
        }
    }
}

impl IndicatorStrategy for MacdCrossStrategy {
    fn name(&self) -> &str {
        "macd_cross"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Trend
    }

    fn min_samples(&self) -> usize {
        // Two signal-line points to detect a cross
        self.slow + self.signal
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        let series = calculate_macd_series(&closes(samples), self.fast, self.slow, self.signal);
        if series.len() < 2 {
            return None;
        }
        let (prev, last) = (&series[series.len() - 2], &series[series.len() - 1]);

        let signal = if prev.histogram <= 0.0 && last.histogram > 0.0 {
            Signal::Buy
        } else if prev.histogram >= 0.0 && last.histogram < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        };
        Some(signal)
    }
}

/// Swing structure confirmed by the side carrying the volume
#[derive(Debug, Clone)]
pub struct MarketStructureStrategy {
    pub lookback: usize,
}

impl Default for MarketStructureStrategy {
    fn default() -> Self {
        Self { lookback: 20 }
    }
}

impl IndicatorStrategy for MarketStructureStrategy {
    fn name(&self) -> &str {
        "market_structure"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Trend
    }

    fn min_samples(&self) -> usize {
        self.lookback + 1
    }

    fn generate_signal(&self, samples: &[PriceSample]) -> Option<Signal> {
        if samples.len() < self.min_samples() {
            return None;
        }

        let prices = closes(samples);
        let volumes: Vec<f64> = samples.iter().map(|s| s.volume).collect();
        let (up_ratio, down_ratio) =
            calculate_volume_direction_ratio(&prices, &volumes, self.lookback)?;

        let signal = match analyze_market_structure(&prices, self.lookback) {
            MarketStructure::HigherHighsHigherLows if up_ratio >= 0.5 => Signal::Buy,
            MarketStructure::LowerHighsLowerLows if down_ratio >= 0.5 => Signal::Sell,
            _ => Signal::Hold,
        };
        Some(signal)
    }
}
