// Core modules
pub mod api;
pub mod backtest;
pub mod config;
pub mod consensus;
pub mod db;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::Settings;
pub use engine::TradingEngine;
pub use error::{EngineError, ServiceError, StoreError};
pub use models::*;
pub use strategy::IndicatorStrategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
