/// MACD (Moving Average Convergence Divergence)
///
/// MACD line = EMA(fast) - EMA(slow)
/// Signal line = EMA(signal) of the MACD line
/// Histogram = MACD line - signal line
use super::moving_average::calculate_ema_series;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD values for every index where the signal line is defined
/// (oldest first). Empty if there isn't `slow + signal - 1` prices.
pub fn calculate_macd_series(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<MacdPoint> {
    if fast == 0 || slow == 0 || signal_period == 0 || fast >= slow {
        return Vec::new();
    }

    let ema_fast = calculate_ema_series(prices, fast);
    let ema_slow = calculate_ema_series(prices, slow);
    if ema_slow.is_empty() {
        return Vec::new();
    }

    // Both series end at the last price; align fast onto slow
    let offset = ema_fast.len() - ema_slow.len();
    let macd_line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, slow_value)| ema_fast[i + offset] - slow_value)
        .collect();

    let signal_line = calculate_ema_series(&macd_line, signal_period);
    if signal_line.is_empty() {
        return Vec::new();
    }

    let offset = macd_line.len() - signal_line.len();
    signal_line
        .iter()
        .enumerate()
        .map(|(i, &signal)| {
            let macd = macd_line[i + offset];
            MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            }
        })
        .collect()
}
