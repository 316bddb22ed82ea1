use anyhow::Context;
use clap::{Parser, Subcommand};
use consensus_trader::api::{
    DenyListTrust, DexScreenerClient, JupiterSimulator, LiveMarketData, LogNotifier,
    NoTrustSignal, PaperAccount, TrustEvaluator,
};
use consensus_trader::config::DEFAULT_CONFIG_PATH;
use consensus_trader::db::PostgresTradeStore;
use consensus_trader::engine::Scheduler;
use consensus_trader::execution::PositionLifecycle;
use consensus_trader::persistence::{InMemoryTradeStore, RedisPriceHistory, TradeGateway, TradeStore};
use consensus_trader::risk::RateLimits;
use consensus_trader::strategy::StrategyEvaluator;
use consensus_trader::{Result, Settings, TradingEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "consensus-trader", about = "Consensus-driven token trading engine")]
struct Cli {
    /// Settings file (missing file means built-in defaults)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the open-position and prospect loops until Ctrl+C
    Run,
    /// Run one evaluation cycle and print the resulting plan as JSON
    Evaluate { token: String },
    /// Per-strategy backtest over the token's stored history
    Backtest { token: String },
    /// List open positions
    Positions,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Command::Run => run(settings).await?,
        Command::Evaluate { token } => {
            let engine = build_engine(&settings).await?;
            let plan = engine.evaluate_and_act_on_token(&token).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Backtest { token } => {
            let engine = build_engine(&settings).await?;
            let results = engine.backtest_token(&token).await?;
            if results.is_empty() {
                println!("Not enough history to evaluate {}", token);
            }
            for result in results {
                let vote = if result.should_buy {
                    "buy"
                } else if result.should_sell {
                    "sell"
                } else {
                    "hold"
                };
                print!("{:<16} {:<5}", result.strategy_name, vote);
                match result.backtest {
                    Some(bt) => println!(
                        "  trades {:>3}  win {:>5.1}%  avg {:+.2}%  total {:+.2}%  dd {:.2}%  sharpe {:.2}",
                        bt.closed_trades,
                        bt.win_rate,
                        bt.average_profit,
                        bt.total_profit,
                        bt.max_drawdown,
                        bt.sharpe_ratio
                    ),
                    None => println!(),
                }
            }
        }
        Command::Positions => {
            let store = connect_store(&settings).await;
            let gateway = TradeGateway::new(store, settings.retry.clone());
            let records = gateway.open_records().await?;
            if records.is_empty() {
                println!("No open positions");
            }
            for record in records {
                let position = record.position(
                    settings.lifecycle.stop_loss_pct,
                    settings.lifecycle.take_profit_pct,
                );
                println!(
                    "{}  {:.6} @ ${:.8}  SL ${:.8}  TP ${:.8}  opened {}{}",
                    position.token_address,
                    position.size,
                    position.entry_price,
                    position.stop_loss,
                    position.take_profit,
                    position.open_timestamp.format("%Y-%m-%d %H:%M:%S"),
                    if record.provisional { "  (provisional)" } else { "" }
                );
            }
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("consensus_trader=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!("🚀 consensus-trader starting (paper account)");

    let engine = Arc::new(build_engine(&settings).await?);
    let scheduler = Arc::new(Scheduler::new(
        engine,
        settings.scheduler.clone(),
        settings.watchlist.clone(),
    ));

    tracing::info!("Press Ctrl+C to stop...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        _ = scheduler.run() => {
            tracing::error!("Scheduler exited");
        }
    }

    tracing::info!("👋 consensus-trader stopped");
    Ok(())
}

/// Postgres when configured and reachable, otherwise an in-memory store
async fn connect_store(settings: &Settings) -> Arc<dyn TradeStore> {
    let Some(url) = settings.services.database_url.as_deref() else {
        tracing::warn!("No database_url configured, trade records will not survive a restart");
        return Arc::new(InMemoryTradeStore::new());
    };

    match PostgresTradeStore::new(url).await {
        Ok(store) => {
            tracing::info!("Postgres trade store enabled");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Postgres ({}), continuing with in-memory records",
                e
            );
            Arc::new(InMemoryTradeStore::new())
        }
    }
}

async fn build_engine(settings: &Settings) -> anyhow::Result<TradingEngine> {
    let services = &settings.services;

    let history = RedisPriceHistory::new(&services.redis_url)
        .await
        .with_context(|| format!("connecting to Redis at {}", services.redis_url))?;
    let dex = DexScreenerClient::with_base_url(services.dexscreener_url.clone());
    let market = Arc::new(LiveMarketData::new(dex, history, services.history_hours));

    let simulator = Arc::new(
        JupiterSimulator::with_base_url(
            services.jupiter_url.clone(),
            settings.lifecycle.slippage_bps,
            services.max_price_impact_pct,
        )
        .with_quote_mint(services.quote_mint.clone(), services.quote_decimals),
    );

    let account = Arc::new(
        PaperAccount::new(settings.paper.starting_balance).with_fee(settings.paper.fee_pct),
    );

    let trust: Arc<dyn TrustEvaluator> = if settings.deny_list.is_empty() {
        Arc::new(NoTrustSignal)
    } else {
        Arc::new(DenyListTrust::new(settings.deny_list.iter().cloned()))
    };

    let store = connect_store(settings).await;
    let gateway = TradeGateway::new(store, settings.retry.clone());

    // Paper holdings live in memory; positions from a previous run must still be sellable
    let open = gateway
        .open_records()
        .await
        .context("loading open positions")?;
    account.restore_open_positions(&open).await;

    let lifecycle = PositionLifecycle::new(
        gateway,
        account.clone(),
        simulator,
        account,
        Arc::new(LogNotifier),
        Arc::new(RateLimits::new(&settings.limits)),
        settings.lifecycle.clone(),
    );

    Ok(TradingEngine::new(
        market,
        trust,
        StrategyEvaluator::with_default_strategies(),
        lifecycle,
        settings.consensus.clone(),
    ))
}
