// Technical indicators module
// Pure functions over price/volume slices (oldest first)

pub mod bollinger;
pub mod macd;
pub mod market_analysis;
pub mod moving_average;
pub mod roc;
pub mod rsi;
pub mod stochastic;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use macd::{calculate_macd_series, MacdPoint};
pub use market_analysis::{
    analyze_market_structure, calculate_volume_direction_ratio, MarketStructure,
};
pub use moving_average::{calculate_ema_series, calculate_sma};
pub use roc::calculate_roc;
pub use rsi::calculate_rsi;
pub use stochastic::calculate_stochastic_k;
