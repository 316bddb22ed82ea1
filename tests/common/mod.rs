#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use consensus_trader::api::{
    ExecutionOutcome, LogNotifier, MarketDataProvider, NoTrustSignal, Notifier, PaperAccount,
    SimulationAction, SimulationResult, TradeEvent, TradeExecutor, TradeRequest, TradeSimulator,
    TrustEvaluator,
};
use consensus_trader::consensus::ConsensusConfig;
use consensus_trader::execution::{LifecycleConfig, PositionLifecycle};
use consensus_trader::persistence::{InMemoryTradeStore, RetryPolicy, TradeGateway, TradeStore};
use consensus_trader::risk::RateLimits;
use consensus_trader::strategy::{RsiStrategy, StrategyEvaluator};
use consensus_trader::{
    IndicatorStrategy, PriceSample, PriceSeries, ServiceError, StoreError, TradePerformanceRecord,
    TradingEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const TOKEN: &str = "TestMint1111111111111111111111111111111111";

/// Samples 5 minutes apart ending just before now
pub fn series_of(prices: &[f64]) -> PriceSeries {
    let start = Utc::now() - Duration::minutes(5 * prices.len() as i64);
    let samples = prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PriceSample {
            timestamp: start + Duration::minutes(5 * i as i64),
            price,
            volume: 1000.0,
        })
        .collect();
    PriceSeries::new(TOKEN, samples).with_market(2_000_000.0, 150_000.0)
}

/// Sideways chop then a sharp drop on the last sample: RSI(14) ends near 29
pub fn rsi_dip() -> Vec<f64> {
    let mut prices: Vec<f64> = (0..30)
        .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
        .collect();
    prices.push(90.0);
    prices
}

/// Sideways chop ending where it started: RSI stays near 50
pub fn flat() -> Vec<f64> {
    (0..31).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect()
}

pub struct StaticMarket {
    series: Mutex<PriceSeries>,
}

impl StaticMarket {
    pub fn new(prices: &[f64]) -> Self {
        Self {
            series: Mutex::new(series_of(prices)),
        }
    }

    pub async fn set(&self, prices: &[f64]) {
        *self.series.lock().await = series_of(prices);
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarket {
    async fn fetch_token_time_series(&self, _token: &str) -> Result<PriceSeries, ServiceError> {
        Ok(self.series.lock().await.clone())
    }
}

pub struct StaticSimulator(pub SimulationAction);

#[async_trait]
impl TradeSimulator for StaticSimulator {
    async fn simulate(&self, _token: &str, _amount: f64) -> Result<SimulationResult, ServiceError> {
        Ok(match self.0 {
            SimulationAction::Execute => SimulationResult::execute(0.2),
            SimulationAction::Reject => SimulationResult::reject("price impact too high"),
        })
    }
}

/// Paper fills behind a call counter, optionally failing every order
pub struct RecordingExecutor {
    pub account: Arc<PaperAccount>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl RecordingExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradeExecutor for RecordingExecutor {
    async fn execute_trade(&self, request: &TradeRequest) -> Result<ExecutionOutcome, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Ok(ExecutionOutcome::failed("blockhash not found"));
        }
        self.account.execute_trade(request).await
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &TradeEvent) -> anyhow::Result<()> {
        anyhow::bail!("alerting endpoint returned 503")
    }
}

/// In-memory store that counts writes
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryTradeStore,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradeStore for CountingStore {
    async fn find_open(&self, token: &str) -> Result<Option<TradePerformanceRecord>, StoreError> {
        self.inner.find_open(token).await
    }

    async fn find_latest_closed(
        &self,
        token: &str,
    ) -> Result<Option<TradePerformanceRecord>, StoreError> {
        self.inner.find_latest_closed(token).await
    }

    async fn list_open(&self) -> Result<Vec<TradePerformanceRecord>, StoreError> {
        self.inner.list_open().await
    }

    async fn list_for_token(&self, token: &str) -> Result<Vec<TradePerformanceRecord>, StoreError> {
        self.inner.list_for_token(token).await
    }

    async fn insert_open(&self, record: &TradePerformanceRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_open(record).await
    }

    async fn close(&self, record: &TradePerformanceRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.close(record).await
    }
}

pub struct Harness {
    pub engine: TradingEngine,
    pub store: Arc<CountingStore>,
    pub market: Arc<StaticMarket>,
    pub account: Arc<PaperAccount>,
    pub executor: Arc<RecordingExecutor>,
}

pub struct HarnessBuilder {
    prices: Vec<f64>,
    strategies: Vec<Box<dyn IndicatorStrategy>>,
    simulation: SimulationAction,
    fail_execution: bool,
    notifier: Arc<dyn Notifier>,
    trust: Arc<dyn TrustEvaluator>,
    balance: f64,
}

impl Harness {
    pub fn builder(prices: &[f64]) -> HarnessBuilder {
        HarnessBuilder {
            prices: prices.to_vec(),
            strategies: vec![Box::new(RsiStrategy::default())],
            simulation: SimulationAction::Execute,
            fail_execution: false,
            notifier: Arc::new(LogNotifier),
            trust: Arc::new(NoTrustSignal),
            balance: 1_000.0,
        }
    }

    pub async fn open_count(&self) -> usize {
        self.store.list_open().await.unwrap().len()
    }
}

impl HarnessBuilder {
    pub fn strategies(mut self, strategies: Vec<Box<dyn IndicatorStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn simulation(mut self, action: SimulationAction) -> Self {
        self.simulation = action;
        self
    }

    pub fn failing_execution(mut self) -> Self {
        self.fail_execution = true;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn trust(mut self, trust: Arc<dyn TrustEvaluator>) -> Self {
        self.trust = trust;
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(CountingStore::default());
        let market = Arc::new(StaticMarket::new(&self.prices));
        let account = Arc::new(PaperAccount::new(self.balance));
        let executor = Arc::new(RecordingExecutor {
            account: account.clone(),
            fail: self.fail_execution,
            calls: AtomicUsize::new(0),
        });

        let lifecycle = PositionLifecycle::new(
            TradeGateway::new(store.clone(), RetryPolicy::default()),
            executor.clone(),
            Arc::new(StaticSimulator(self.simulation)),
            account.clone(),
            self.notifier,
            Arc::new(RateLimits::unlimited()),
            LifecycleConfig::default(),
        );

        let engine = TradingEngine::new(
            market.clone(),
            self.trust,
            StrategyEvaluator::new(self.strategies),
            lifecycle,
            ConsensusConfig::default(),
        );

        Harness {
            engine,
            store,
            market,
            account,
            executor,
        }
    }
}
