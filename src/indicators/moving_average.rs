/// Calculate Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Exponential Moving Average (EMA) value for every index from `period - 1` onwards, seeded with the SMA
/// of the first `period` prices.
///
/// Returned vector has `prices.len() - period + 1` entries (empty if
/// insufficient data).
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let initial_sma = prices[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(prices.len() - period + 1);
    let mut ema = initial_sma;
    series.push(ema);

    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    series
}
