use std::sync::Arc;

use tracing::info;

use tickpipe_rs::config::Config;
use tickpipe_rs::persist::postgres::PostgresTickStore;
use tickpipe_rs::persist::retention::RetentionSweeper;
use tickpipe_rs::pipeline::{dispatcher, WorkerContext, WorkerPool};
use tickpipe_rs::source::nats::NatsSource;
use tickpipe_rs::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    telemetry::init_tracing("info");
    let cfg = Config::from_env()?;
    telemetry::init_metrics(cfg.metrics_port);

    let store = PostgresTickStore::connect(&cfg.database.url).await?;
    info!("connected to database");

    let source = NatsSource::connect(&cfg.broker.url, &cfg.processor.queue).await?;
    info!(
        exchange = %cfg.processor.exchange,
        queue = %cfg.processor.queue,
        "subscribed to broker queue"
    );

    let sweeper = RetentionSweeper::new(
        store.pool().clone(),
        cfg.retention.window,
        cfg.retention.sweep_interval,
    );
    tokio::spawn(sweeper.run());

    let pool = WorkerPool::new(WorkerContext {
        exchange: cfg.processor.exchange,
        store: Arc::new(store),
        queue_capacity: cfg.processor.queue_capacity,
        idle_sleep: cfg.processor.idle_sleep,
    });
    for _ in 0..cfg.processor.worker_count {
        pool.add_worker();
    }

    // Runs until the subscription ends, then closes every worker queue.
    dispatcher::run(source, &pool, cfg.processor.batch_size).await;

    // Let the workers drain what they already have.
    pool.join().await;
    info!("pipeline stopped");

    Ok(())
}
