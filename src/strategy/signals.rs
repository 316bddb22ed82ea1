use crate::indicators::{calculate_rsi, calculate_sma};
use crate::models::Signal;

/// Configuration for the composite momentum signal
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub volume_threshold: f64, // Multiple of average volume
    // Panic buy settings (flash crash detection)
    pub enable_panic_buy: bool,
    pub panic_rsi_threshold: f64,
    pub panic_volume_multiplier: f64,
    pub panic_price_drop_pct: f64,
    pub panic_drop_window: usize, // samples to look back for the drop
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            short_ma_period: 10,
            long_ma_period: 20,
            volume_threshold: 1.5,
            enable_panic_buy: true,
            panic_rsi_threshold: 30.0,
            panic_volume_multiplier: 2.0,
            panic_price_drop_pct: 8.0,
            panic_drop_window: 12,
        }
    }
}

/// Indicator values at the last sample
#[derive(Debug, Clone, Copy)]
struct Reading {
    price: f64,
    rsi: f64,
    short_ma: f64,
    long_ma: f64,
    // None when any volume sample is missing (zero)
    volume_ratio: Option<f64>,
}

impl Reading {
    fn take(prices: &[f64], volumes: &[f64], config: &SignalConfig) -> Option<Self> {
        let volume_ratio = if volumes.iter().all(|&v| v > 0.1) {
            let mean = volumes.iter().sum::<f64>() / volumes.len() as f64;
            Some(volumes.last()? / mean)
        } else {
            None
        };

        Some(Self {
            price: *prices.last()?,
            rsi: calculate_rsi(prices, config.rsi_period)?,
            short_ma: calculate_sma(prices, config.short_ma_period)?,
            long_ma: calculate_sma(prices, config.long_ma_period)?,
            volume_ratio,
        })
    }
}

/// Flash-crash entry: oversold, a sharp drop off the recent high, heavy
/// volume, and still near the long average.
fn is_panic_entry(reading: &Reading, prices: &[f64], config: &SignalConfig) -> bool {
    let Some(volume_ratio) = reading.volume_ratio else {
        return false;
    };
    if !config.enable_panic_buy || prices.len() <= config.panic_drop_window {
        return false;
    }

    let recent_high = prices[prices.len() - config.panic_drop_window..]
        .iter()
        .copied()
        .fold(f64::MIN, f64::max);
    let drop_pct = (recent_high - reading.price) / recent_high * 100.0;

    let triggered = reading.rsi < config.panic_rsi_threshold
        && drop_pct >= config.panic_price_drop_pct
        && volume_ratio > config.panic_volume_multiplier
        && reading.price > reading.long_ma * 0.92;

    if triggered {
        tracing::debug!(
            "Panic entry: RSI={:.1}, drop={:.1}%, volume={:.2}x",
            reading.rsi,
            drop_pct,
            volume_ratio
        );
    }
    triggered
}

/// Buy on 3 of 4 confirmations (all 3 price ones when volume is missing);
/// sell when overbought with the short average under the long one.
fn composite_vote(reading: &Reading, config: &SignalConfig) -> Signal {
    let price_checks = [
        reading.rsi < config.rsi_oversold + 10.0,
        reading.short_ma > reading.long_ma,
        reading.price > reading.short_ma,
    ];
    let price_votes = price_checks.iter().filter(|&&ok| ok).count();

    let buy = match reading.volume_ratio {
        Some(ratio) => price_votes + usize::from(ratio > config.volume_threshold) >= 3,
        None => price_votes == price_checks.len(),
    };

    if buy {
        Signal::Buy
    } else if reading.rsi > config.rsi_overbought && reading.short_ma < reading.long_ma {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Composite RSI / moving-average / volume signal over aligned price and
/// volume histories. None when the history is too short or misaligned.
pub fn analyze_market_conditions(
    prices: &[f64],
    volumes: &[f64],
    config: &SignalConfig,
) -> Option<Signal> {
    if prices.len() <= config.long_ma_period || volumes.len() != prices.len() {
        return None;
    }

    let reading = Reading::take(prices, volumes, config)?;
    tracing::trace!(?reading, "Composite indicators");

    if is_panic_entry(&reading, prices, config) {
        return Some(Signal::Buy);
    }
    Some(composite_vote(&reading, config))
}
