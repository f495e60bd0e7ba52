// Live worker registry. Workers reference peers by stable id and resolve
// them through this registry, so removal never leaves dangling handles.

use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::market::Exchange;
use crate::persist::TickStore;
use crate::source::RawDelivery;

use super::worker::Worker;

/// Monotonically increasing, never reused.
pub type WorkerId = u64;

/// Everything a worker loop needs besides its own queue.
pub struct WorkerContext {
    pub exchange: Exchange,
    pub store: Arc<dyn TickStore>,
    /// Bounded capacity of each worker's input queue.
    pub queue_capacity: usize,
    /// How long an idle worker sleeps when neither its own queue nor any
    /// peer queue yields a message.
    pub idle_sleep: Duration,
}

pub(crate) struct WorkerEntry {
    pub(crate) id: WorkerId,
    pub(crate) tx: async_channel::Sender<RawDelivery>,
    pub(crate) rx: async_channel::Receiver<RawDelivery>,
    /// Symmetric peer list: kept in lockstep with every other live entry.
    pub(crate) peers: Vec<WorkerId>,
}

#[derive(Default)]
pub(crate) struct PoolInner {
    pub(crate) workers: Vec<WorkerEntry>,
    next_id: WorkerId,
}

impl PoolInner {
    /// Resolve a worker's current peers into dequeue handles. Missing
    /// entries (peers racing a removal) are silently skipped.
    pub(crate) fn peer_queues(
        &self,
        id: WorkerId,
    ) -> Vec<(WorkerId, async_channel::Receiver<RawDelivery>)> {
        let Some(me) = self.workers.iter().find(|w| w.id == id) else {
            return Vec::new();
        };
        me.peers
            .iter()
            .filter_map(|peer_id| {
                self.workers
                    .iter()
                    .find(|w| w.id == *peer_id)
                    .map(|w| (w.id, w.rx.clone()))
            })
            .collect()
    }
}

pub struct WorkerPool {
    inner: Arc<Mutex<PoolInner>>,
    tracker: TaskTracker,
    ctx: Arc<WorkerContext>,
}

impl WorkerPool {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner::default())),
            tracker: TaskTracker::new(),
            ctx: Arc::new(ctx),
        }
    }

    /// Create a worker with a fresh bounded queue, register it as a peer
    /// of every live worker (and vice versa), and start its loop as a
    /// tracked task.
    pub fn add_worker(&self) -> WorkerId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let (tx, rx) = async_channel::bounded(self.ctx.queue_capacity);
        let peers: Vec<WorkerId> = inner.workers.iter().map(|w| w.id).collect();
        for entry in inner.workers.iter_mut() {
            entry.peers.push(id);
        }
        inner.workers.push(WorkerEntry {
            id,
            tx,
            rx: rx.clone(),
            peers,
        });

        let worker = Worker::new(id, rx, Arc::clone(&self.inner), Arc::clone(&self.ctx));
        self.tracker.spawn(worker.run());

        info!(worker_id = id, live = inner.workers.len(), "worker added");
        gauge!("tickpipe_workers_live").set(inner.workers.len() as f64);
        id
    }

    /// Close the worker's queue and unlink it from every peer list. The
    /// loop drains what is already queued and exits on its own; an
    /// unknown id is a no-op.
    pub fn remove_worker(&self, id: WorkerId) {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.workers.iter().position(|w| w.id == id) else {
            return;
        };
        let entry = inner.workers.remove(pos);
        entry.tx.close();
        for remaining in inner.workers.iter_mut() {
            remaining.peers.retain(|peer| *peer != id);
        }

        info!(worker_id = id, live = inner.workers.len(), "worker removed");
        gauge!("tickpipe_workers_live").set(inner.workers.len() as f64);
    }

    pub fn worker_count(&self) -> usize {
        self.inner.lock().workers.len()
    }

    /// Pick one live worker uniformly at random and hand out a clone of
    /// its queue sender. The structural lock is released before the
    /// caller sends, so a full queue never blocks add/remove.
    pub(crate) fn pick_random(
        &self,
    ) -> Option<(WorkerId, async_channel::Sender<RawDelivery>)> {
        use rand::Rng;

        let inner = self.inner.lock();
        if inner.workers.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..inner.workers.len());
        let entry = &inner.workers[idx];
        Some((entry.id, entry.tx.clone()))
    }

    /// Close every live queue (graceful-shutdown signal). Workers finish
    /// draining and then stop.
    pub(crate) fn close_queues(&self) {
        let inner = self.inner.lock();
        for entry in inner.workers.iter() {
            entry.tx.close();
        }
    }

    /// Wait until every worker loop has exited.
    pub async fn join(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    #[cfg(test)]
    pub(crate) fn peers_of(&self, id: WorkerId) -> Option<Vec<WorkerId>> {
        self.inner
            .lock()
            .workers
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.peers.clone())
    }

    /// Register a queue with no processing loop, so only stealing peers
    /// can drain it.
    #[cfg(test)]
    pub(crate) fn add_stub_queue(&self) -> (WorkerId, async_channel::Sender<RawDelivery>) {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let (tx, rx) = async_channel::bounded(self.ctx.queue_capacity);
        let peers: Vec<WorkerId> = inner.workers.iter().map(|w| w.id).collect();
        for entry in inner.workers.iter_mut() {
            entry.peers.push(id);
        }
        inner.workers.push(WorkerEntry {
            id,
            tx: tx.clone(),
            rx,
            peers,
        });
        (id, tx)
    }
}
