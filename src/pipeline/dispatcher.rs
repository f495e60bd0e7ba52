// Drains the message source, groups deliveries into batches, and routes
// each batch to one randomly chosen worker. The queue send is the only
// backpressure point: it waits while the chosen queue is full, and that
// wait slows down how fast the source is drained.

use metrics::counter;
use tracing::{debug, info, warn};

use crate::source::{MessageSource, RawDelivery};

use super::pool::WorkerPool;

/// Consume `source` until it is exhausted. Flushes the final partial
/// batch, closes every worker queue, and returns without waiting for the
/// workers; the caller awaits the pool for that.
pub async fn run<S: MessageSource>(mut source: S, pool: &WorkerPool, batch_size: usize) {
    let mut batch: Vec<RawDelivery> = Vec::with_capacity(batch_size);

    while let Some(delivery) = source.next().await {
        batch.push(delivery);
        if batch.len() >= batch_size {
            dispatch_batch(pool, &mut batch).await;
        }
    }

    if !batch.is_empty() {
        dispatch_batch(pool, &mut batch).await;
    }

    info!("source exhausted, closing worker queues");
    pool.close_queues();
}

/// Enqueue the whole batch, in order, into one random worker's queue.
/// With zero live workers the batch is dropped: deliveries were already
/// acknowledged at receipt, so there is nowhere to push them back to.
async fn dispatch_batch(pool: &WorkerPool, batch: &mut Vec<RawDelivery>) {
    let Some((worker_id, queue)) = pool.pick_random() else {
        warn!(dropped = batch.len(), "no live workers, dropping batch");
        counter!("tickpipe_batches_dropped_total").increment(1);
        batch.clear();
        return;
    };

    debug!(worker_id, size = batch.len(), "dispatching batch");
    let deliveries: Vec<RawDelivery> = batch.drain(..).collect();
    let total = deliveries.len();
    for (sent, delivery) in deliveries.into_iter().enumerate() {
        if queue.send(delivery).await.is_err() {
            // The worker was removed mid-batch; the rest of this batch
            // is lost, same as any other post-acknowledge drop.
            warn!(
                worker_id,
                lost = total - sent,
                "worker queue closed mid-batch, dropping remainder"
            );
            break;
        }
    }
}
