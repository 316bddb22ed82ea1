/// Bollinger Bands: SMA(period) +/- k standard deviations (population)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn calculate_bollinger(prices: &[f64], period: usize, std_devs: f64) -> Option<BollingerBands> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(BollingerBands {
        upper: mean + std_devs * std_dev,
        middle: mean,
        lower: mean - std_devs * std_dev,
    })
}
