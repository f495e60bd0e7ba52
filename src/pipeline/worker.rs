// Work-stealing processing loop. Reads are always non-blocking: a worker
// drains its own queue first, then tries each peer once, then sleeps.

use std::sync::Arc;

use async_channel::TryRecvError;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::market::normaliser::normalise;
use crate::market::payloads::RawExchangePayload;
use crate::source::RawDelivery;

use super::pool::{PoolInner, WorkerContext, WorkerId};

pub(crate) struct Worker {
    id: WorkerId,
    jobs: async_channel::Receiver<RawDelivery>,
    registry: Arc<Mutex<PoolInner>>,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        jobs: async_channel::Receiver<RawDelivery>,
        registry: Arc<Mutex<PoolInner>>,
        ctx: Arc<WorkerContext>,
    ) -> Self {
        Self {
            id,
            jobs,
            registry,
            ctx,
        }
    }

    /// Active until the own queue is closed and drained.
    pub(crate) async fn run(self) {
        loop {
            match self.jobs.try_recv() {
                Ok(delivery) => self.process(delivery).await,
                Err(TryRecvError::Closed) => {
                    debug!(worker_id = self.id, "queue closed and drained, stopping");
                    break;
                }
                Err(TryRecvError::Empty) => {
                    if !self.try_steal().await {
                        tokio::time::sleep(self.ctx.idle_sleep).await;
                    }
                }
            }
        }
    }

    /// One pass over the current peer list; processes at most one stolen
    /// message. Peer queues that are empty or already closed are skipped.
    async fn try_steal(&self) -> bool {
        let peers = self.registry.lock().peer_queues(self.id);
        for (peer_id, queue) in peers {
            if let Ok(delivery) = queue.try_recv() {
                debug!(worker_id = self.id, peer_id, "stole a job from peer");
                counter!("tickpipe_jobs_stolen_total").increment(1);
                self.process(delivery).await;
                return true;
            }
        }
        false
    }

    /// Decode, normalise and persist one delivery. Every failure is
    /// message-local: log, drop, keep going. The broker acknowledged the
    /// message at receipt, so there is no redelivery to ask for.
    async fn process(&self, delivery: RawDelivery) {
        let exchange = self.ctx.exchange;

        let payload = match RawExchangePayload::decode(exchange, &delivery.body) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(worker_id = self.id, %exchange, %err, "dropping undecodable delivery");
                counter!("tickpipe_ticks_rejected_total", "reason" => "decode").increment(1);
                return;
            }
        };

        let tick = match normalise(payload) {
            Ok(tick) => tick,
            Err(err) => {
                warn!(worker_id = self.id, %exchange, %err, "tick rejected");
                counter!("tickpipe_ticks_rejected_total", "reason" => "invalid").increment(1);
                return;
            }
        };

        match self.ctx.store.save_tick(&tick).await {
            Ok(()) => {
                info!(
                    worker_id = self.id,
                    exchange = %tick.exchange,
                    symbol = %tick.symbol,
                    price = tick.price,
                    "tick persisted"
                );
                counter!("tickpipe_ticks_persisted_total").increment(1);
            }
            Err(err) => {
                // Not retried: the next tick for this symbol supersedes it.
                error!(worker_id = self.id, symbol = %tick.symbol, %err, "failed to persist tick");
                counter!("tickpipe_ticks_rejected_total", "reason" => "store").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::market::Exchange;
    use crate::persist::{MarketTick, StoreResult, TickStore};
    use crate::pipeline::pool::{WorkerContext, WorkerPool};

    use super::*;

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

    async fn wait_for_ticks(store: &RecordingStore, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if store.ticks.lock().len() >= count {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} ticks"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn idle_worker_steals_from_a_loaded_peer() {
        let store = Arc::new(RecordingStore::default());
        let pool = WorkerPool::new(WorkerContext {
            exchange: Exchange::Binance,
            store: Arc::clone(&store) as Arc<dyn TickStore>,
            queue_capacity: 100,
            idle_sleep: Duration::from_millis(5),
        });

        // One real worker with an empty queue, plus a peer queue that has
        // no loop of its own, so stealing is the only way it drains.
        pool.add_worker();
        let (_peer_id, peer_tx) = pool.add_stub_queue();

        for i in 0..3 {
            peer_tx.send(binance_delivery(&format!("SYM{i}"))).await.unwrap();
        }

        wait_for_ticks(&store, 3).await;

        pool.close_queues();
        pool.join().await;
        assert_eq!(store.ticks.lock().len(), 3);
    }

    #[tokio::test]
    async fn store_failure_does_not_stop_the_worker() {
        struct FlakyStore {
            inner: RecordingStore,
            failed_once: Mutex<bool>,
        }

        #[async_trait]
        impl TickStore for FlakyStore {
            async fn ensure_ticker(&self, e: &str, s: &str, m: &str) -> StoreResult<i64> {
                self.inner.ensure_ticker(e, s, m).await
            }

            async fn insert_tick(&self, id: i64, tick: &MarketTick) -> StoreResult<()> {
                let first = {
                    let mut failed = self.failed_once.lock();
                    if !*failed {
                        *failed = true;
                        true
                    } else {
                        false
                    }
                };
                if first {
                    return Err(crate::persist::StoreError::TickerMissing {
                        exchange: tick.exchange.clone(),
                        symbol: tick.symbol.clone(),
                        market: tick.market.clone(),
                    });
                }
                self.inner.insert_tick(id, tick).await
            }
        }

        let store = Arc::new(FlakyStore {
            inner: RecordingStore::default(),
            failed_once: Mutex::new(false),
        });
        let pool = WorkerPool::new(WorkerContext {
            exchange: Exchange::Binance,
            store: Arc::clone(&store) as Arc<dyn TickStore>,
            queue_capacity: 100,
            idle_sleep: Duration::from_millis(5),
        });
        pool.add_worker();

        let (_id, tx) = pool.add_stub_queue();
        tx.send(binance_delivery("FAILS")).await.unwrap();
        tx.send(binance_delivery("LANDS")).await.unwrap();

        wait_for_ticks(&store.inner, 1).await;

        pool.close_queues();
        pool.join().await;

        let ticks = store.inner.ticks.lock();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].symbol, "LANDS");
    }
}
