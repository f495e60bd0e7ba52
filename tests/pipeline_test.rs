// End-to-end pipeline scenarios against an in-memory store and a
// channel-backed source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use tickpipe_rs::market::Exchange;
use tickpipe_rs::persist::{MarketTick, StoreResult, TickStore};
use tickpipe_rs::pipeline::{dispatcher, WorkerContext, WorkerPool};
use tickpipe_rs::source::RawDelivery;

#[derive(Default)]
struct RecordingStore {
    ticks: Mutex<Vec<MarketTick>>,
}

#[async_trait]
impl TickStore for RecordingStore {
    async fn ensure_ticker(&self, _: &str, _: &str, _: &str) -> StoreResult<i64> {
        Ok(1)
    }

    async fn insert_tick(&self, _: i64, tick: &MarketTick) -> StoreResult<()> {
        self.ticks.lock().push(tick.clone());
        Ok(())
    }
}

fn test_pool(store: Arc<RecordingStore>) -> WorkerPool {
    WorkerPool::new(WorkerContext {
        exchange: Exchange::Binance,
        store,
        queue_capacity: 100,
        idle_sleep: Duration::from_millis(5),
    })
}

fn binance_delivery(symbol: &str) -> RawDelivery {
    let body = serde_json::json!({
        "s": symbol,
        "c": "100.5",
        "v": "2.0",
        "h": "101.0",
        "l": "99.0",
        "P": "1.2",
    });
    RawDelivery {
        body: Bytes::from(body.to_string()),
    }
}

fn raw_delivery(json: &str) -> RawDelivery {
    RawDelivery {
        body: Bytes::from(json.to_string()),
    }
}

#[tokio::test]
async fn single_worker_processes_all_batches_in_order() {
    let store = Arc::new(RecordingStore::default());
    let pool = test_pool(Arc::clone(&store));
    pool.add_worker();

    // 25 deliveries at batch size 10: two full batches plus a final
    // partial flush of 5, all landing on the only worker.
    let (tx, rx) = mpsc::channel(64);
    for i in 0..25 {
        tx.send(binance_delivery(&format!("SYM{i:02}"))).await.unwrap();
    }
    drop(tx);

    dispatcher::run(rx, &pool, 10).await;
    pool.join().await;

    let ticks = store.ticks.lock();
    assert_eq!(ticks.len(), 25);
    let symbols: Vec<&str> = ticks.iter().map(|t| t.symbol.as_str()).collect();
    let expected: Vec<String> = (0..25).map(|i| format!("SYM{i:02}")).collect();
    assert_eq!(symbols, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn full_batch_with_no_workers_is_dropped_silently() {
    let store = Arc::new(RecordingStore::default());
    let pool = test_pool(Arc::clone(&store));

    let (tx, rx) = mpsc::channel(16);
    for i in 0..10 {
        tx.send(binance_delivery(&format!("SYM{i}"))).await.unwrap();
    }
    drop(tx);

    dispatcher::run(rx, &pool, 10).await;
    pool.join().await;

    assert!(store.ticks.lock().is_empty());
}

#[tokio::test]
async fn invalid_messages_are_dropped_without_persistence() {
    let store = Arc::new(RecordingStore::default());
    let pool = test_pool(Arc::clone(&store));
    pool.add_worker();

    let (tx, rx) = mpsc::channel(16);
    // Undecodable bytes.
    tx.send(raw_delivery("this is not json")).await.unwrap();
    // Placeholder price below the 0.1 floor.
    tx.send(raw_delivery(
        r#"{"s":"DUST","c":"0.0001","v":"1.0","h":"1.0","l":"1.0","P":"0.0"}"#,
    ))
    .await
    .unwrap();
    // Unparsable volume.
    tx.send(raw_delivery(
        r#"{"s":"BADVOL","c":"50.0","v":"??","h":"51.0","l":"49.0","P":"0.5"}"#,
    ))
    .await
    .unwrap();
    // One good tick.
    tx.send(binance_delivery("GOOD")).await.unwrap();
    drop(tx);

    dispatcher::run(rx, &pool, 2).await;
    pool.join().await;

    let ticks = store.ticks.lock();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].symbol, "GOOD");
    assert_eq!(ticks[0].price, 100_500);
}

#[tokio::test]
async fn work_spreads_and_completes_across_several_workers() {
    let store = Arc::new(RecordingStore::default());
    let pool = test_pool(Arc::clone(&store));
    for _ in 0..3 {
        pool.add_worker();
    }

    let (tx, rx) = mpsc::channel(256);
    for i in 0..200 {
        tx.send(binance_delivery(&format!("SYM{i:03}"))).await.unwrap();
    }
    drop(tx);

    dispatcher::run(rx, &pool, 10).await;
    pool.join().await;

    // No ordering guarantee across workers, but nothing is lost.
    let mut symbols: Vec<String> = store
        .ticks
        .lock()
        .iter()
        .map(|t| t.symbol.clone())
        .collect();
    symbols.sort();
    let mut expected: Vec<String> = (0..200).map(|i| format!("SYM{i:03}")).collect();
    expected.sort();
    assert_eq!(symbols, expected);
}

#[tokio::test]
async fn removed_worker_is_never_routed_to() {
    let store = Arc::new(RecordingStore::default());
    let pool = test_pool(Arc::clone(&store));
    let first = pool.add_worker();
    pool.add_worker();

    let (tx, rx) = mpsc::channel(64);
    for i in 0..20 {
        tx.send(binance_delivery(&format!("SYM{i:02}"))).await.unwrap();
    }
    drop(tx);

    pool.remove_worker(first);
    dispatcher::run(rx, &pool, 5).await;
    pool.join().await;

    // The dispatcher only ever routes to live workers, so the survivor
    // receives every batch and nothing is lost.
    assert_eq!(store.ticks.lock().len(), 20);
}
