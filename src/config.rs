//! Layered settings: serde defaults, then an optional TOML file, then
//! `TRADER__SECTION__KEY` environment variables.

use crate::consensus::ConsensusConfig;
use crate::engine::SchedulerConfig;
use crate::execution::LifecycleConfig;
use crate::persistence::RetryPolicy;
use crate::risk::RateLimitConfig;
use anyhow::{bail, Context};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/trader.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub database_url: Option<String>,
    pub redis_url: String,
    pub dexscreener_url: String,
    pub jupiter_url: String,
    pub quote_mint: String,
    pub quote_decimals: u32,
    pub max_price_impact_pct: f64, // percent, 1.0 = 1%
    pub history_hours: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            dexscreener_url: crate::api::dexscreener::DEXSCREENER_API_BASE.to_string(),
            jupiter_url: crate::api::jupiter::JUPITER_QUOTE_API.to_string(),
            quote_mint: crate::api::jupiter::USDC_MINT.to_string(),
            quote_decimals: 6,
            max_price_impact_pct: 3.0,
            history_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub starting_balance: f64,
    pub fee_pct: f64,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            starting_balance: 10_000.0,
            fee_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub consensus: ConsensusConfig,
    pub lifecycle: LifecycleConfig,
    pub retry: RetryPolicy,
    pub scheduler: SchedulerConfig,
    pub limits: RateLimitConfig,
    pub services: ServiceSettings,
    pub paper: PaperSettings,
    pub watchlist: Vec<String>,
    /// Tokens treated as compromised: any open position is exited at once
    pub deny_list: Vec<String>,
}

impl Settings {
    /// Load from `path` (optional) and the environment, then validate
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("TRADER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("watchlist")
                    .with_list_parse_key("deny_list"),
            )
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?
            .try_deserialize()
            .context("invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.consensus;
        for (name, value) in [("buy_threshold", c.buy_threshold), ("sell_threshold", c.sell_threshold)] {
            if !(0.0..=100.0).contains(&value) {
                bail!("consensus.{} must be within 0-100, got {}", name, value);
            }
        }

        let l = &self.lifecycle;
        if l.take_profit_pct <= 0.0 {
            bail!("lifecycle.take_profit_pct must be positive");
        }
        if l.stop_loss_pct <= 0.0 || l.stop_loss_pct >= 1.0 {
            bail!("lifecycle.stop_loss_pct must be between 0 and 1");
        }
        if l.rapid_dump_pct <= 0.0 {
            bail!("lifecycle.rapid_dump_pct must be positive");
        }
        if l.reentry_cooldown_secs < 0 {
            bail!("lifecycle.reentry_cooldown_secs cannot be negative");
        }
        if l.dust_threshold < 0.0 {
            bail!("lifecycle.dust_threshold cannot be negative");
        }
        if l.min_trade_size <= 0.0 || l.max_trade_size < l.min_trade_size {
            bail!(
                "lifecycle trade size range {}..{} is invalid",
                l.min_trade_size,
                l.max_trade_size
            );
        }
        if l.position_size_pct <= 0.0 || l.position_size_pct > 1.0 {
            bail!("lifecycle.position_size_pct must be within (0, 1]");
        }

        let s = &self.scheduler;
        if s.jitter_min_ms > s.jitter_max_ms {
            bail!("scheduler.jitter_min_ms exceeds jitter_max_ms");
        }
        if s.rate_limit_backoff_min_secs > s.rate_limit_backoff_max_secs {
            bail!("scheduler rate-limit backoff min exceeds max");
        }
        if s.open_position_interval_secs == 0 || s.prospect_interval_secs == 0 {
            bail!("scheduler intervals must be positive");
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            bail!("retry.max_delay_ms is below base_delay_ms");
        }
        if self.paper.starting_balance < 0.0 {
            bail!("paper.starting_balance cannot be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.consensus.buy_threshold, 50.0);
        assert_eq!(settings.consensus.sell_threshold, 50.0);
        assert_eq!(settings.lifecycle.reentry_cooldown_secs, 600);
        assert_eq!(settings.retry.max_retries, 3);
        assert_eq!(settings.retry.base_delay_ms, 100);
        assert_eq!(settings.retry.max_delay_ms, 2000);
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let mut settings = Settings::default();
        settings.consensus.buy_threshold = 120.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_jitter() {
        let mut settings = Settings::default();
        settings.scheduler.jitter_min_ms = 5000;
        settings.scheduler.jitter_max_ms = 100;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load("does/not/exist.toml").unwrap();
        assert_eq!(settings.lifecycle.take_profit_pct, 0.25);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("trader-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "watchlist = [\"MINT_A\", \"MINT_B\"]\n\n[consensus]\nbuy_threshold = 60.0\n\n[lifecycle]\nstop_loss_pct = 0.05"
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.consensus.buy_threshold, 60.0);
        assert_eq!(settings.consensus.sell_threshold, 50.0);
        assert_eq!(settings.lifecycle.stop_loss_pct, 0.05);
        assert_eq!(settings.lifecycle.take_profit_pct, 0.25);
        assert_eq!(settings.watchlist, vec!["MINT_A", "MINT_B"]);
    }
}
