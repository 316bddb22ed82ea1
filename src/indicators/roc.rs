/// Rate of change: percent move between the price `period` samples ago and now
pub fn calculate_roc(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let current = prices[prices.len() - 1];
    let past = prices[prices.len() - 1 - period];
    if past <= 0.0 {
        return None;
    }

    Some((current - past) / past * 100.0)
}
