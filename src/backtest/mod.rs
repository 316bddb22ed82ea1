pub mod metrics;
pub mod runner;

pub use metrics::{BacktestMetrics, TradeRecord};
pub use runner::run_backtest;
