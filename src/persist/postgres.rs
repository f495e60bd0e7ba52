use sqlx::Row;
use tracing::debug;

use crate::persist::types::{MarketTick, StoreError, StoreResult};
use crate::persist::TickStore;

pub struct PostgresTickStore {
    pool: sqlx::PgPool,
}

impl PostgresTickStore {
    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = sqlx::PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl TickStore for PostgresTickStore {
    async fn ensure_ticker(
        &self,
        exchange: &str,
        symbol: &str,
        market: &str,
    ) -> StoreResult<i64> {
        let existing = sqlx::query(
            r#"
            SELECT id FROM tickers
            WHERE exchange = $1 AND symbol = $2 AND market = $3
            "#,
        )
        .bind(exchange)
        .bind(symbol)
        .bind(market)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            return Ok(row.get("id"));
        }

        // First observation of this key. The insert is a no-op when a
        // concurrent creator got there first, in which case it returns
        // no row and we re-read the winner's id.
        let inserted = sqlx::query(
            r#"
            INSERT INTO tickers (exchange, symbol, market)
            VALUES ($1, $2, $3)
            ON CONFLICT (exchange, symbol, market) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(exchange)
        .bind(symbol)
        .bind(market)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            debug!(exchange, symbol, market, "created ticker dimension row");
            return Ok(row.get("id"));
        }

        let row = sqlx::query(
            r#"
            SELECT id FROM tickers
            WHERE exchange = $1 AND symbol = $2 AND market = $3
            "#,
        )
        .bind(exchange)
        .bind(symbol)
        .bind(market)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.get("id")).ok_or_else(|| StoreError::TickerMissing {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            market: market.to_string(),
        })
    }

    async fn insert_tick(&self, ticker_id: i64, tick: &MarketTick) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO market_data
                (ticker_id, price, volume, high_price, low_price, price_change_percent, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(ticker_id)
        .bind(tick.price)
        .bind(tick.volume)
        .bind(tick.high)
        .bind(tick.low)
        .bind(&tick.price_change_percent)
        .bind(tick.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
