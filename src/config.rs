// Environment-backed configuration. Values arrive from the orchestration
// layer as env vars; .env files are honoured for local runs.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::market::Exchange;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Which payload shape this instance decodes.
    pub exchange: Exchange,
    /// Broker subject carrying that exchange's raw ticks.
    pub queue: String,
    pub worker_count: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub idle_sleep: Duration,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub window: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub database: DatabaseConfig,
    pub processor: ProcessorConfig,
    pub retention: RetentionConfig,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let exchange: Exchange = env::var("EXCHANGE")
            .context("EXCHANGE is not set")?
            .parse()?;

        Ok(Config {
            broker: BrokerConfig {
                url: env::var("NATS_URL").context("NATS_URL is not set")?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            },
            processor: ProcessorConfig {
                exchange,
                queue: env::var("QUEUE").context("QUEUE is not set")?,
                worker_count: env_or("WORKER_COUNT", 4)?,
                batch_size: env_or("BATCH_SIZE", 10)?,
                queue_capacity: env_or("QUEUE_CAPACITY", 100)?,
                idle_sleep: Duration::from_secs(env_or("IDLE_SLEEP_SECS", 10)?),
            },
            retention: RetentionConfig {
                window: Duration::from_secs(env_or("RETENTION_WINDOW_SECS", 300)?),
                sweep_interval: Duration::from_secs(env_or("RETENTION_SWEEP_SECS", 30)?),
            },
            metrics_port: env_or("METRICS_PORT", 9000)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => {
            let parsed = raw
                .parse()
                .with_context(|| format!("invalid {key} value {raw:?}"))?;
            Ok(parsed)
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(key.to_string()),
    }
}
