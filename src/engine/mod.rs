//! One evaluation cycle per token, and the periodic driver that runs them.

pub mod scheduler;

use crate::api::{MarketDataProvider, TrustEvaluator};
use crate::consensus::{aggregate, generate_trade_plan, ConsensusConfig};
use crate::error::EngineError;
use crate::execution::{evaluate_exit, ExitReason, PositionLifecycle, TransitionOutcome};
use crate::models::{Horizon, MarketSnapshot, PriceSeries, SignalResult, TradeAction, TradePlan};
use crate::strategy::StrategyEvaluator;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use scheduler::{Scheduler, SchedulerConfig};

pub struct TradingEngine {
    market: Arc<dyn MarketDataProvider>,
    trust: Arc<dyn TrustEvaluator>,
    evaluator: StrategyEvaluator,
    lifecycle: PositionLifecycle,
    consensus: ConsensusConfig,
}

impl TradingEngine {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        trust: Arc<dyn TrustEvaluator>,
        evaluator: StrategyEvaluator,
        lifecycle: PositionLifecycle,
        consensus: ConsensusConfig,
    ) -> Self {
        Self {
            market,
            trust,
            evaluator,
            lifecycle,
            consensus,
        }
    }

    pub fn lifecycle(&self) -> &PositionLifecycle {
        &self.lifecycle
    }

    /// Tokens that currently hold an open record
    pub async fn open_tokens(&self) -> Result<Vec<String>, EngineError> {
        let records = self.lifecycle.gateway().open_records().await?;
        Ok(records.into_iter().map(|r| r.token_address).collect())
    }

    pub async fn evaluate_and_act_on_token(&self, token_address: &str) -> Result<TradePlan, EngineError> {
        self.evaluate_and_act_on_token_at(token_address, Utc::now()).await
    }

    /// Run one cycle for `token_address` as of `now`.
    ///
    /// Hard exits (compromised, stop loss, rapid dump, take profit) are
    /// checked before any strategy votes. The returned plan describes what
    /// was actually done: a consensus action that the lifecycle refused
    /// comes back as Hold with the refusal in `reasoning`.
    pub async fn evaluate_and_act_on_token_at(
        &self,
        token_address: &str,
        now: DateTime<Utc>,
    ) -> Result<TradePlan, EngineError> {
        let series = self.market.fetch_token_time_series(token_address).await?;
        let market = snapshot(token_address, &series)?;

        let mut open = self.lifecycle.gateway().open_record(token_address).await?;
        if open.is_none() {
            match self.lifecycle.recover_untracked(token_address, market, now).await {
                Ok(recovered) => open = recovered,
                Err(e) => {
                    tracing::warn!(token = %token_address, "Balance recovery check failed: {}", e)
                }
            }
        }

        if let Some(record) = &open {
            let compromised = match self.trust.is_compromised(token_address).await {
                Ok(flag) => flag,
                Err(e) => {
                    tracing::warn!(token = %token_address, "Trust evaluation failed, assuming trusted: {}", e);
                    false
                }
            };
            let change_30m = series.price_change_pct(Horizon::M30);

            if let Some(reason) = evaluate_exit(
                record,
                market.price,
                change_30m,
                compromised,
                self.lifecycle.config(),
            ) {
                let mut plan = TradePlan {
                    token_address: token_address.to_string(),
                    action: TradeAction::Sell,
                    buy_percentage: 0.0,
                    sell_percentage: 0.0,
                    reasoning: vec![format!(
                        "Hard exit ({}): {:+.2}% since entry at ${:.8}",
                        reason,
                        record.unrealized_return(market.price) * 100.0,
                        record.buy_price
                    )],
                };
                plan.reasoning.extend(price_changes(&series));
                let outcome = self.lifecycle.sell(token_address, market, reason, now).await?;
                return Ok(settle(plan, outcome));
            }
        }

        let signals = self.evaluator.evaluate_all(token_address, &series);
        let score = aggregate(&signals);
        let mut plan = generate_trade_plan(
            token_address,
            &score,
            self.consensus.buy_threshold,
            self.consensus.sell_threshold,
        );
        plan.reasoning.extend(price_changes(&series));

        tracing::debug!(
            token = %token_address,
            "Consensus over {} strategies: buy {:.1}% sell {:.1}% -> {}",
            score.evaluated,
            score.buy_percentage,
            score.sell_percentage,
            plan.action
        );

        match (plan.action, open.is_some()) {
            (TradeAction::Buy, true) => {
                Ok(plan.overridden(TradeAction::Hold, "Position already open"))
            }
            (TradeAction::Buy, false) => {
                let outcome = self.lifecycle.buy(token_address, market, now).await?;
                Ok(settle(plan, outcome))
            }
            (TradeAction::Sell, false) => {
                Ok(plan.overridden(TradeAction::Hold, "No open position to sell"))
            }
            (TradeAction::Sell, true) => {
                let outcome = self
                    .lifecycle
                    .sell(token_address, market, ExitReason::Recommendation, now)
                    .await?;
                Ok(settle(plan, outcome))
            }
            (TradeAction::Hold, _) => Ok(plan),
        }
    }

    /// Current votes with a forward-walk backtest over the token's series.
    /// Nothing is traded.
    pub async fn backtest_token(&self, token_address: &str) -> Result<Vec<SignalResult>, EngineError> {
        let series = self.market.fetch_token_time_series(token_address).await?;
        Ok(self.evaluator.evaluate_with_backtest(token_address, &series))
    }
}

/// "Price change: 30m -4.10%, 1h +2.00%" over the horizons the history covers
fn price_changes(series: &PriceSeries) -> Option<String> {
    let changes: Vec<String> = Horizon::ALL
        .iter()
        .filter_map(|h| {
            series
                .price_change_pct(*h)
                .map(|pct| format!("{} {:+.2}%", h.label(), pct))
        })
        .collect();

    if changes.is_empty() {
        None
    } else {
        Some(format!("Price change: {}", changes.join(", ")))
    }
}

fn snapshot(token_address: &str, series: &PriceSeries) -> Result<MarketSnapshot, EngineError> {
    match series.latest_price() {
        Some(price) if price.is_finite() && price > 0.0 => Ok(MarketSnapshot {
            price,
            market_cap: series.market_cap,
            liquidity: series.liquidity,
        }),
        Some(price) => Err(EngineError::MarketData {
            token: token_address.to_string(),
            reason: format!("invalid latest price {}", price),
        }),
        None => Err(EngineError::MarketData {
            token: token_address.to_string(),
            reason: "empty price series".to_string(),
        }),
    }
}

/// Fold a lifecycle outcome back into the plan
fn settle(plan: TradePlan, outcome: TransitionOutcome) -> TradePlan {
    match outcome {
        TransitionOutcome::Opened(_) | TransitionOutcome::Closed { .. } => plan,
        TransitionOutcome::Rejected(rejection) => {
            plan.overridden(TradeAction::Hold, format!("Rejected: {}", rejection))
        }
        TransitionOutcome::ExecutionFailed(error) => {
            plan.overridden(TradeAction::Hold, format!("Execution failed: {}", error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        LogNotifier, NoTrustSignal, PaperAccount, SimulationResult, TradeSimulator,
    };
    use crate::error::ServiceError;
    use crate::execution::LifecycleConfig;
    use crate::models::PriceSample;
    use crate::persistence::{InMemoryTradeStore, RetryPolicy, TradeGateway, TradeStore};
    use crate::risk::RateLimits;
    use crate::strategy::oscillators::RsiStrategy;
    use async_trait::async_trait;
    use chrono::Duration;
    use tokio::sync::Mutex;

    struct ScriptedMarket {
        series: Mutex<PriceSeries>,
    }

    impl ScriptedMarket {
        fn new(prices: &[f64]) -> Self {
            Self {
                series: Mutex::new(series_of(prices)),
            }
        }

        async fn set(&self, prices: &[f64]) {
            *self.series.lock().await = series_of(prices);
        }
    }

    fn series_of(prices: &[f64]) -> PriceSeries {
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
        PriceSeries::new("TOKEN", samples).with_market(1_000_000.0, 50_000.0)
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedMarket {
        async fn fetch_token_time_series(&self, _token: &str) -> Result<PriceSeries, ServiceError> {
            Ok(self.series.lock().await.clone())
        }
    }

    struct AlwaysExecute;

    #[async_trait]
    impl TradeSimulator for AlwaysExecute {
        async fn simulate(&self, _token: &str, _amount: f64) -> Result<SimulationResult, ServiceError> {
            Ok(SimulationResult::execute(0.1))
        }
    }

    fn rsi_dip() -> Vec<f64> {
        let mut prices: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        prices.push(90.0);
        prices
    }

    fn engine(market: Arc<ScriptedMarket>, store: Arc<InMemoryTradeStore>) -> TradingEngine {
        let account = Arc::new(PaperAccount::new(1000.0));
        let lifecycle = PositionLifecycle::new(
            TradeGateway::new(store, RetryPolicy::default()),
            account.clone(),
            Arc::new(AlwaysExecute),
            account,
            Arc::new(LogNotifier),
            Arc::new(RateLimits::unlimited()),
            LifecycleConfig::default(),
        );
        TradingEngine::new(
            market,
            Arc::new(NoTrustSignal),
            StrategyEvaluator::new(vec![Box::new(RsiStrategy::default())]),
            lifecycle,
            ConsensusConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_rsi_dip_buys() {
        let store = Arc::new(InMemoryTradeStore::new());
        let engine = engine(Arc::new(ScriptedMarket::new(&rsi_dip())), store.clone());

        let plan = engine.evaluate_and_act_on_token("TOKEN").await.unwrap();

        assert_eq!(plan.action, TradeAction::Buy);
        assert_eq!(plan.buy_percentage, 100.0);
        assert_eq!(plan.sell_percentage, 0.0);
        assert!(store.find_open("TOKEN").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_repeat_signal_holds_while_open() {
        let store = Arc::new(InMemoryTradeStore::new());
        let engine = engine(Arc::new(ScriptedMarket::new(&rsi_dip())), store.clone());

        engine.evaluate_and_act_on_token("TOKEN").await.unwrap();
        let plan = engine.evaluate_and_act_on_token("TOKEN").await.unwrap();

        assert_eq!(plan.action, TradeAction::Hold);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_stop_loss_preempts_consensus() {
        let store = Arc::new(InMemoryTradeStore::new());
        let market = Arc::new(ScriptedMarket::new(&rsi_dip()));
        let engine = engine(market.clone(), store.clone());
        engine.evaluate_and_act_on_token("TOKEN").await.unwrap();

        // Still an RSI buy signal, but 20% under the 90.0 entry
        let mut crash = rsi_dip();
        crash.push(72.0);
        market.set(&crash).await;

        let plan = engine.evaluate_and_act_on_token("TOKEN").await.unwrap();

        assert_eq!(plan.action, TradeAction::Sell);
        assert!(plan.reasoning[0].contains("stop loss"));
        assert!(store.find_open("TOKEN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_series_is_market_data_error() {
        let store = Arc::new(InMemoryTradeStore::new());
        let engine = engine(Arc::new(ScriptedMarket::new(&[])), store);

        let err = engine.evaluate_and_act_on_token("TOKEN").await.unwrap_err();
        assert!(matches!(err, EngineError::MarketData { .. }));
    }

    #[tokio::test]
    async fn test_backtest_token_reports_each_strategy() {
        let store = Arc::new(InMemoryTradeStore::new());
        let engine = engine(Arc::new(ScriptedMarket::new(&rsi_dip())), store.clone());

        let results = engine.backtest_token("TOKEN").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].strategy_name, "rsi");
        assert!(results[0].should_buy);
        assert!(results[0].backtest.is_some());
        assert!(store.find_open("TOKEN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plan_reports_covered_horizons() {
        let store = Arc::new(InMemoryTradeStore::new());
        let engine = engine(Arc::new(ScriptedMarket::new(&rsi_dip())), store);

        let plan = engine.evaluate_and_act_on_token("TOKEN").await.unwrap();

        // 31 five-minute samples reach back 30m/1h/2h but not 4h
        let changes = plan
            .reasoning
            .iter()
            .find(|r| r.starts_with("Price change:"))
            .expect("horizon changes in reasoning");
        assert!(changes.contains("30m -10.00%"));
        assert!(changes.contains("2h "));
        assert!(!changes.contains("4h"));
    }
}
