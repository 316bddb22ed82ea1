//! Periodic driver.
//!
//! Two loops share one engine: a fast one over tokens with an open record
//! and a slow one over the prospect watchlist. Tokens are evaluated one at a
//! time with a jittered pause in between, and a token is never evaluated by
//! both loops at once inside this process.

use super::TradingEngine;
use crate::models::TradePlan;
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub open_position_interval_secs: u64,
    pub prospect_interval_secs: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub rate_limit_backoff_min_secs: u64,
    pub rate_limit_backoff_max_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            open_position_interval_secs: 60,
            prospect_interval_secs: 300,
            jitter_min_ms: 500,
            jitter_max_ms: 3000,
            rate_limit_backoff_min_secs: 30,
            rate_limit_backoff_max_secs: 120,
        }
    }
}

pub struct Scheduler {
    engine: Arc<TradingEngine>,
    config: SchedulerConfig,
    watchlist: Vec<String>,
    in_flight: Mutex<HashSet<String>>,
    backoff_until: Mutex<HashMap<String, Instant>>,
}

/// Removes the token from the in-flight set when the cycle ends
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    token: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.token);
        }
    }
}

impl Scheduler {
    pub fn new(engine: Arc<TradingEngine>, config: SchedulerConfig, watchlist: Vec<String>) -> Self {
        Self {
            engine,
            config,
            watchlist,
            in_flight: Mutex::new(HashSet::new()),
            backoff_until: Mutex::new(HashMap::new()),
        }
    }

    /// Run both loops until one of them exits (they don't, short of a panic)
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            "Scheduler starting: open positions every {}s, {} prospects every {}s",
            self.config.open_position_interval_secs,
            self.watchlist.len(),
            self.config.prospect_interval_secs
        );

        let open_loop = {
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.open_position_loop().await })
        };
        let prospect_loop = {
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.prospect_loop().await })
        };

        tokio::select! {
            result = open_loop => tracing::error!("Open-position loop exited: {:?}", result),
            result = prospect_loop => tracing::error!("Prospect loop exited: {:?}", result),
        }
    }

    async fn open_position_loop(&self) {
        let period = Duration::from_secs(self.config.open_position_interval_secs.max(1));
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let tokens = match self.engine.open_tokens().await {
                Ok(tokens) => tokens,
                Err(e) => {
                    tracing::warn!("Could not list open positions: {}", e);
                    continue;
                }
            };
            tracing::debug!("[OPEN] Tick: {} open positions", tokens.len());
            self.evaluate_batch(&tokens).await;
        }
    }

    async fn prospect_loop(&self) {
        let period = Duration::from_secs(self.config.prospect_interval_secs.max(1));
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tracing::debug!("[PROSPECT] Tick: {} watchlist tokens", self.watchlist.len());
            self.evaluate_batch(&self.watchlist).await;
        }
    }

    async fn evaluate_batch(&self, tokens: &[String]) {
        self.prune_expired_backoffs();
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.jitter()).await;
            }
            if let Some(plan) = self.evaluate_token(token).await {
                tracing::info!(
                    token = %token,
                    "{} (buy {:.1}% / sell {:.1}%): {}",
                    plan.action,
                    plan.buy_percentage,
                    plan.sell_percentage,
                    plan.reasoning.join("; ")
                );
            }
        }
    }

    /// One guarded cycle. None when the token was skipped or the cycle failed.
    pub async fn evaluate_token(&self, token: &str) -> Option<TradePlan> {
        if self.backing_off(token) {
            tracing::debug!(token = %token, "Skipping, rate-limit backoff active");
            return None;
        }
        let _guard = self.claim(token)?;

        match self.engine.evaluate_and_act_on_token(token).await {
            Ok(plan) => Some(plan),
            Err(e) if e.is_rate_limited() => {
                let backoff = self.rate_limit_backoff();
                tracing::warn!(token = %token, "Rate limited, backing off {:?}: {}", backoff, e);
                if let Ok(mut map) = self.backoff_until.lock() {
                    map.insert(token.to_string(), Instant::now() + backoff);
                }
                None
            }
            Err(e) => {
                tracing::warn!(token = %token, "Cycle failed: {}", e);
                None
            }
        }
    }

    fn claim(&self, token: &str) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(token.to_string()) {
            tracing::debug!(token = %token, "Skipping, already being evaluated");
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            token: token.to_string(),
        })
    }

    fn backing_off(&self, token: &str) -> bool {
        let Ok(mut map) = self.backoff_until.lock() else {
            return false;
        };
        match map.get(token) {
            Some(until) if Instant::now() < *until => true,
            Some(_) => {
                map.remove(token);
                false
            }
            None => false,
        }
    }

    /// Drop expired entries, including tokens no loop will visit again
    fn prune_expired_backoffs(&self) {
        if let Ok(mut map) = self.backoff_until.lock() {
            let now = Instant::now();
            map.retain(|_, until| now < *until);
        }
    }

    fn jitter(&self) -> Duration {
        let (lo, hi) = ordered(self.config.jitter_min_ms, self.config.jitter_max_ms);
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    fn rate_limit_backoff(&self) -> Duration {
        let (lo, hi) = ordered(
            self.config.rate_limit_backoff_min_secs,
            self.config.rate_limit_backoff_max_secs,
        );
        Duration::from_secs(rand::thread_rng().gen_range(lo..=hi))
    }
}

fn ordered(a: u64, b: u64) -> (u64, u64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        LogNotifier, MarketDataProvider, NoTrustSignal, PaperAccount, SimulationResult,
        TradeSimulator,
    };
    use crate::consensus::ConsensusConfig;
    use crate::error::ServiceError;
    use crate::execution::{LifecycleConfig, PositionLifecycle};
    use crate::models::PriceSeries;
    use crate::persistence::{InMemoryTradeStore, RetryPolicy, TradeGateway};
    use crate::risk::RateLimits;
    use crate::strategy::StrategyEvaluator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ThrottledMarket {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for ThrottledMarket {
        async fn fetch_token_time_series(&self, _token: &str) -> Result<PriceSeries, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::RateLimited {
                service: "dexscreener".into(),
            })
        }
    }

    struct NeverCalled;

    #[async_trait]
    impl TradeSimulator for NeverCalled {
        async fn simulate(&self, _token: &str, _amount: f64) -> Result<SimulationResult, ServiceError> {
            Ok(SimulationResult::reject("unused"))
        }
    }

    fn scheduler(market: Arc<ThrottledMarket>) -> Scheduler {
        let account = Arc::new(PaperAccount::new(100.0));
        let lifecycle = PositionLifecycle::new(
            TradeGateway::new(Arc::new(InMemoryTradeStore::new()), RetryPolicy::default()),
            account.clone(),
            Arc::new(NeverCalled),
            account,
            Arc::new(LogNotifier),
            Arc::new(RateLimits::unlimited()),
            LifecycleConfig::default(),
        );
        let engine = TradingEngine::new(
            market,
            Arc::new(NoTrustSignal),
            StrategyEvaluator::with_default_strategies(),
            lifecycle,
            ConsensusConfig::default(),
        );
        Scheduler::new(Arc::new(engine), SchedulerConfig::default(), vec!["TOKEN".into()])
    }

    #[tokio::test]
    async fn test_rate_limit_sets_backoff() {
        let market = Arc::new(ThrottledMarket {
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler(market.clone());

        assert!(scheduler.evaluate_token("TOKEN").await.is_none());
        assert!(scheduler.backing_off("TOKEN"));

        // Skipped without touching the market while backing off
        assert!(scheduler.evaluate_token("TOKEN").await.is_none());
        assert_eq!(market.calls.load(Ordering::SeqCst), 1);

        // Other tokens are unaffected
        assert!(!scheduler.backing_off("OTHER"));
    }

    #[tokio::test]
    async fn test_batch_prunes_expired_backoffs() {
        let scheduler = scheduler(Arc::new(ThrottledMarket {
            calls: AtomicUsize::new(0),
        }));
        {
            let mut map = scheduler.backoff_until.lock().unwrap();
            // Throttled once, then dropped from both loops
            map.insert("DELISTED".into(), Instant::now());
            map.insert("TOKEN".into(), Instant::now() + Duration::from_secs(60));
        }

        scheduler.evaluate_batch(&[]).await;

        let map = scheduler.backoff_until.lock().unwrap();
        assert!(!map.contains_key("DELISTED"));
        assert!(map.contains_key("TOKEN"));
    }

    #[tokio::test]
    async fn test_in_flight_token_is_skipped() {
        let market = Arc::new(ThrottledMarket {
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler(market.clone());

        let guard = scheduler.claim("TOKEN");
        assert!(guard.is_some());
        assert!(scheduler.claim("TOKEN").is_none());
        assert!(scheduler.evaluate_token("TOKEN").await.is_none());
        assert_eq!(market.calls.load(Ordering::SeqCst), 0);

        drop(guard);
        assert!(scheduler.claim("TOKEN").is_some());
    }

    #[test]
    fn test_jitter_within_range() {
        let config = SchedulerConfig {
            jitter_min_ms: 10,
            jitter_max_ms: 20,
            ..Default::default()
        };
        let scheduler = Scheduler {
            config,
            ..scheduler(Arc::new(ThrottledMarket {
                calls: AtomicUsize::new(0),
            }))
        };
        for _ in 0..50 {
            let d = scheduler.jitter();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }
}
