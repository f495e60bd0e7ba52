// Periodic retention sweep over the tick table. A Postgres advisory lock
// elects a single sweeper across all processor instances; losers skip the
// round instead of contending on the delete.

use std::time::Duration;

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error, info};

use crate::persist::types::StoreResult;

const RETENTION_LOCK_ID: i64 = 12345;

pub struct RetentionSweeper {
    pool: sqlx::PgPool,
    window: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(pool: sqlx::PgPool, window: Duration, interval: Duration) -> Self {
        Self {
            pool,
            window,
            interval,
        }
    }

    /// Sweep forever on the configured interval. Failures are logged and
    /// the next round runs anyway.
    pub async fn run(self) {
        info!(
            window_secs = self.window.as_secs(),
            interval_secs = self.interval.as_secs(),
            "starting retention sweeper"
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep_once().await {
                error!(%err, "retention sweep failed");
            }
        }
    }

    /// One sweep round. Returns the number of deleted rows, or None when
    /// another instance holds the sweep lock.
    pub async fn sweep_once(&self) -> StoreResult<Option<u64>> {
        // Advisory locks are per-connection, so the lock, the delete and
        // the unlock must all run on the same pooled connection.
        let mut conn = self.pool.acquire().await?;

        let acquired: bool = sqlx::query("SELECT pg_try_advisory_lock($1)")
            .bind(RETENTION_LOCK_ID)
            .fetch_one(&mut *conn)
            .await?
            .get(0);

        if !acquired {
            debug!("retention lock held by another instance, skipping round");
            return Ok(None);
        }

        let cutoff = Utc::now() - chrono::Duration::seconds(self.window.as_secs() as i64);
        let result = sqlx::query("DELETE FROM market_data WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&mut *conn)
            .await;

        let unlock = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(RETENTION_LOCK_ID)
            .execute(&mut *conn)
            .await;
        if let Err(err) = unlock {
            error!(%err, "failed to release retention lock");
        }

        let deleted = result?.rows_affected();
        info!(deleted, "retention sweep complete");
        Ok(Some(deleted))
    }
}
