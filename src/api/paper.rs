use super::{ExecutionOutcome, TradeExecutor, TradeRequest, Wallet};
use crate::error::ServiceError;
use crate::models::TradePerformanceRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct PaperState {
    quote_balance: f64,
    holdings: HashMap<String, f64>,
}

/// Simulated account that fills every order at its expected price.
///
/// Acts as both executor and wallet so balances stay consistent with fills.
#[derive(Debug, Default)]
pub struct PaperAccount {
    state: Mutex<PaperState>,
    fee_pct: f64,
}

impl PaperAccount {
    pub fn new(quote_balance: f64) -> Self {
        Self {
            state: Mutex::new(PaperState {
                quote_balance,
                holdings: HashMap::new(),
            }),
            fee_pct: 0.0,
        }
    }

    /// Fee taken from each fill, as a fraction (0.003 = 0.3%)
    pub fn with_fee(mut self, fee_pct: f64) -> Self {
        self.fee_pct = fee_pct;
        self
    }

    /// Seed a token balance the engine doesn't know about
    pub async fn deposit_token(&self, token_address: &str, amount: f64) {
        let mut state = self.state.lock().await;
        *state.holdings.entry(token_address.to_string()).or_insert(0.0) += amount;
    }

    /// Rebuild holdings for positions opened by an earlier process.
    ///
    /// Each open record's tokens are credited and its entry cost is taken
    /// out of the quote balance, as if the buy had filled on this account.
    pub async fn restore_open_positions(&self, records: &[TradePerformanceRecord]) {
        let mut state = self.state.lock().await;
        let mut restored = 0;
        for record in records.iter().filter(|r| r.is_open()) {
            *state
                .holdings
                .entry(record.token_address.clone())
                .or_insert(0.0) += record.buy_amount;
            state.quote_balance = (state.quote_balance - record.buy_value_usd).max(0.0);
            restored += 1;
        }
        if restored > 0 {
            tracing::info!(
                "Paper account restored {} open positions, ${:.2} quote left",
                restored,
                state.quote_balance
            );
        }
    }
}

#[async_trait]
impl TradeExecutor for PaperAccount {
    async fn execute_trade(&self, request: &TradeRequest) -> Result<ExecutionOutcome, ServiceError> {
        if !(request.expected_price.is_finite() && request.expected_price > 0.0) {
            return Ok(ExecutionOutcome::failed("no valid price to fill at"));
        }
        if !(request.amount.is_finite() && request.amount > 0.0) {
            return Ok(ExecutionOutcome::failed("amount must be positive"));
        }

        let mut state = self.state.lock().await;
        let signature = format!("paper-{}", Uuid::new_v4());

        if request.is_sell {
            let held = state
                .holdings
                .get(&request.token_address)
                .copied()
                .unwrap_or(0.0);
            if held + f64::EPSILON < request.amount {
                return Ok(ExecutionOutcome::failed(format!(
                    "insufficient token balance: {} < {}",
                    held, request.amount
                )));
            }

            let proceeds = request.amount * request.expected_price * (1.0 - self.fee_pct);
            let remaining = (held - request.amount).max(0.0);
            if remaining > 0.0 {
                state.holdings.insert(request.token_address.clone(), remaining);
            } else {
                state.holdings.remove(&request.token_address);
            }
            state.quote_balance += proceeds;

            tracing::debug!("Paper sell {} {} -> ${:.2}", request.amount, request.token_address, proceeds);
            Ok(ExecutionOutcome::filled(signature, proceeds))
        } else {
            if state.quote_balance + f64::EPSILON < request.amount {
                return Ok(ExecutionOutcome::failed(format!(
                    "insufficient quote balance: {:.2} < {:.2}",
                    state.quote_balance, request.amount
                )));
            }

            let tokens = request.amount * (1.0 - self.fee_pct) / request.expected_price;
            state.quote_balance = (state.quote_balance - request.amount).max(0.0);
            *state
                .holdings
                .entry(request.token_address.clone())
                .or_insert(0.0) += tokens;

            tracing::debug!("Paper buy ${:.2} of {} -> {}", request.amount, request.token_address, tokens);
            Ok(ExecutionOutcome::filled(signature, tokens))
        }
    }
}

#[async_trait]
impl Wallet for PaperAccount {
    async fn quote_balance(&self) -> Result<f64, ServiceError> {
        Ok(self.state.lock().await.quote_balance)
    }

    async fn token_balance(&self, token_address: &str) -> Result<f64, ServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .holdings
            .get(token_address)
            .copied()
            .unwrap_or(0.0))
    }
}
