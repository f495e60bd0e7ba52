use chrono::{DateTime, Utc};

/// All five exchanges feed the crypto market category.
pub const MARKET_CRYPTO: &str = "crypto";

/// Canonical market update. price/volume/high/low are fixed-point
/// integers scaled x1000 from the exchange-native decimal strings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketTick {
    pub exchange: String,
    pub symbol: String,
    pub market: String,
    pub price: i64,
    pub volume: i64,
    pub high: i64,
    pub low: i64,
    pub price_change_percent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failure: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("ticker row missing after upsert for {exchange}/{symbol}/{market}")]
    TickerMissing {
        exchange: String,
        symbol: String,
        market: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
