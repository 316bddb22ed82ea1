use super::{Notifier, TradeEvent};
use async_trait::async_trait;

/// Writes trade events to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &TradeEvent) -> anyhow::Result<()> {
        match event {
            TradeEvent::PositionOpened { record } => tracing::info!(
                "🟢 Opened {}: {:.6} tokens @ ${:.8} (${:.2})",
                record.token_address,
                record.buy_amount,
                record.buy_price,
                record.buy_value_usd
            ),
            TradeEvent::PositionClosed { record, reason } => tracing::info!(
                "🔴 Closed {} ({}): P&L ${:.2} ({:+.2}%)",
                record.token_address,
                reason,
                record.profit_usd.unwrap_or(0.0),
                record.profit_percent.unwrap_or(0.0)
            ),
            TradeEvent::PositionRecovered { record } => tracing::warn!(
                "🟡 Recovered untracked {} balance: {:.6} tokens @ ${:.8}",
                record.token_address,
                record.buy_amount,
                record.buy_price
            ),
        }
        Ok(())
    }
}
