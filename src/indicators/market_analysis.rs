/// Market structure and volume analysis
///
/// Provides functions to analyze price structure (higher highs/lows) and volume direction

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarketStructure {
    HigherHighsHigherLows, // Uptrend
    LowerHighsLowerLows,   // Downtrend
    Mixed,                 // No clear structure
}

/// Analyze market structure over a lookback period
///
/// Returns the predominant market structure:
/// - HigherHighsHigherLows: Uptrend (most swings are higher highs + higher lows)
/// - LowerHighsLowerLows: Downtrend (most swings are lower highs + lower lows)
/// - Mixed: No clear structure
pub fn analyze_market_structure(prices: &[f64], lookback: usize) -> MarketStructure {
    if prices.len() < lookback || lookback < 4 {
        return MarketStructure::Mixed;
    }

    let recent = &prices[prices.len() - lookback..];

    // Find swing highs and lows (local peaks and troughs)
    let mut swing_highs = Vec::new();
    let mut swing_lows = Vec::new();

    for window in recent.windows(3) {
        let (prev, curr, next) = (window[0], window[1], window[2]);

        if curr > prev && curr > next {
            swing_highs.push(curr);
        }

        if curr < prev && curr < next {
            swing_lows.push(curr);
        }
    }

    // Need at least 2 swing highs and 2 swing lows to determine structure
    if swing_highs.len() < 2 || swing_lows.len() < 2 {
        return MarketStructure::Mixed;
    }

    let (higher_highs, lower_highs) = count_direction(&swing_highs);
    let (higher_lows, lower_lows) = count_direction(&swing_lows);

    let uptrend_signals = higher_highs + higher_lows;
    let downtrend_signals = lower_highs + lower_lows;

    if uptrend_signals > downtrend_signals && uptrend_signals >= 3 {
        MarketStructure::HigherHighsHigherLows
    } else if downtrend_signals > uptrend_signals && downtrend_signals >= 3 {
        MarketStructure::LowerHighsLowerLows
    } else {
        MarketStructure::Mixed
    }
}

fn count_direction(swings: &[f64]) -> (usize, usize) {
    swings.windows(2).fold((0, 0), |(up, down), pair| {
        if pair[1] > pair[0] {
            (up + 1, down)
        } else {
            (up, down + 1)
        }
    })
}

/// Calculate the ratio of up-volume to down-volume
///
/// Returns (up_volume_ratio, down_volume_ratio) over lookback period
/// Ratios sum to 1.0
pub fn calculate_volume_direction_ratio(
    prices: &[f64],
    volumes: &[f64],
    lookback: usize,
) -> Option<(f64, f64)> {
    if prices.len() != volumes.len() || prices.len() < lookback + 1 {
        return None;
    }

    let start = prices.len() - lookback;

    let mut up_volume = 0.0;
    let mut down_volume = 0.0;

    for i in start..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            up_volume += volumes[i];
        } else if change < 0.0 {
            down_volume += volumes[i];
        }
        // Unchanged samples don't count
    }

    let total = up_volume + down_volume;
    if total == 0.0 {
        return Some((0.5, 0.5));
    }

    Some((up_volume / total, down_volume / total))
}
