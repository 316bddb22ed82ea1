use super::{SimulationResult, TradeSimulator};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

// Jupiter Swap API v1
// Docs: https://dev.jup.ag/docs/swap-api/get-quote
pub const JUPITER_QUOTE_API: &str = "https://lite-api.jup.ag/swap/v1";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const USDC_DECIMALS: u32 = 6;
const SERVICE: &str = "jupiter";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    price_impact_pct: String,
    #[serde(default)]
    route_plan: Vec<serde_json::Value>, // Complex nested structure, only checked for emptiness
}

/// Quote information from Jupiter
#[derive(Debug, Clone)]
pub struct Quote {
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: f64, // percent, 1.0 = 1%
    pub route_count: usize,
}

/// Pre-trade check against Jupiter quotes.
///
/// Recommends execution only when a route exists and its price impact is
/// within the configured ceiling.
#[derive(Clone)]
pub struct JupiterSimulator {
    client: Client,
    base_url: String,
    quote_mint: String,
    quote_decimals: u32,
    slippage_bps: u16,
    max_price_impact_pct: f64,
}

impl JupiterSimulator {
    pub fn new(slippage_bps: u16, max_price_impact_pct: f64) -> Self {
        Self::with_base_url(JUPITER_QUOTE_API, slippage_bps, max_price_impact_pct)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        slippage_bps: u16,
        max_price_impact_pct: f64,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            quote_mint: USDC_MINT.to_string(),
            quote_decimals: USDC_DECIMALS,
            slippage_bps,
            max_price_impact_pct,
        }
    }

    /// Quote asset the engine spends, with its decimal places
    pub fn with_quote_mint(mut self, mint: impl Into<String>, decimals: u32) -> Self {
        self.quote_mint = mint.into();
        self.quote_decimals = decimals;
        self
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (smallest denomination of the input)
    ///
    /// Returns `Ok(None)` when Jupiter reports no route.
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
    ) -> Result<Option<Quote>, ServiceError> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.base_url, input_mint, output_mint, amount, self.slippage_bps
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ServiceError::RateLimited {
                    service: SERVICE.to_string(),
                })
            }
            // Unroutable pairs come back as client errors
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!("No Jupiter route {} -> {}: {}", input_mint, output_mint, body);
                return Ok(None);
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::Http {
                    service: SERVICE.to_string(),
                    status: s.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;

        let in_amount: u64 = quote
            .in_amount
            .parse()
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;
        let out_amount: u64 = quote
            .out_amount
            .parse()
            .map_err(|e| ServiceError::invalid(SERVICE, e))?;
        // Jupiter reports impact as a fraction
        let price_impact: f64 = quote.price_impact_pct.parse().unwrap_or(0.0);

        Ok(Some(Quote {
            in_amount,
            out_amount,
            price_impact_pct: price_impact * 100.0,
            route_count: quote.route_plan.len(),
        }))
    }
}

#[async_trait]
impl TradeSimulator for JupiterSimulator {
    async fn simulate(
        &self,
        token_address: &str,
        amount: f64,
    ) -> Result<SimulationResult, ServiceError> {
        let raw_amount = (amount * 10f64.powi(self.quote_decimals as i32)).floor();
        if !raw_amount.is_finite() || raw_amount < 1.0 {
            return Ok(SimulationResult::reject(format!("amount {} too small to quote", amount)));
        }

        let Some(quote) = self
            .get_quote(&self.quote_mint, token_address, raw_amount as u64)
            .await?
        else {
            return Ok(SimulationResult::reject("no route"));
        };

        if quote.route_count == 0 || quote.out_amount == 0 {
            return Ok(SimulationResult::reject("empty route"));
        }

        if quote.price_impact_pct > self.max_price_impact_pct {
            let mut result = SimulationResult::reject(format!(
                "price impact {:.2}% above {:.2}%",
                quote.price_impact_pct, self.max_price_impact_pct
            ));
            result.price_impact_pct = quote.price_impact_pct;
            return Ok(result);
        }

        Ok(SimulationResult::execute(quote.price_impact_pct))
    }
}
