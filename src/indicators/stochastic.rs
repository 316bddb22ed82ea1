/// Stochastic %K computed on close prices only (no high/low in our series)
///
/// %K = (close - lowest) / (highest - lowest) * 100 over the last `period`
/// samples. A flat window returns 50.
pub fn calculate_stochastic_k(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let highest = window.iter().cloned().fold(f64::MIN, f64::max);
    let lowest = window.iter().cloned().fold(f64::MAX, f64::min);
    let close = prices[prices.len() - 1];

    let range = highest - lowest;
    if range <= 0.0 {
        return Some(50.0);
    }

    Some((close - lowest) / range * 100.0)
}
