pub mod types;
pub use types::*;
pub mod postgres;
pub mod retention;
use async_trait::async_trait;

/// Durable sink for canonical ticks: an idempotent ticker dimension plus
/// an append-only tick table.
#[async_trait]
pub trait TickStore: Send + Sync {
    /// Resolve the surrogate id for a ticker key, creating the row on
    /// first observation. Concurrent callers with the same key all get
    /// the same id and exactly one row exists afterwards.
    async fn ensure_ticker(&self, exchange: &str, symbol: &str, market: &str)
        -> StoreResult<i64>;

    /// Append one tick row. No dedup: broker redelivery produces
    /// duplicate rows by design.
    async fn insert_tick(&self, ticker_id: i64, tick: &MarketTick) -> StoreResult<()>;

    async fn save_tick(&self, tick: &MarketTick) -> StoreResult<()> {
        let ticker_id = self
            .ensure_ticker(&tick.exchange, &tick.symbol, &tick.market)
            .await?;
        self.insert_tick(ticker_id, tick).await
    }
}
