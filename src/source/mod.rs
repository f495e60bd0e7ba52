// Message source module entrypoint
pub mod nats; // broker-backed source (NATS core subscription)

use async_trait::async_trait;
use bytes::Bytes;

/// One raw broker delivery. The broker has already acknowledged receipt
/// by the time the payload reaches this pipeline, so a dropped delivery
/// is permanently lost from this process's perspective.
#[derive(Debug, Clone)]
pub struct RawDelivery {
    pub body: Bytes,
}

/// Ordered stream of raw deliveries. Yields None once the upstream
/// subscription has ended; that is the shutdown signal for the whole
/// pipeline, not an error.
#[async_trait]
pub trait MessageSource: Send {
    async fn next(&mut self) -> Option<RawDelivery>;
}

// Channel-backed source, used by tests and local wiring.
#[async_trait]
impl MessageSource for tokio::sync::mpsc::Receiver<RawDelivery> {
    async fn next(&mut self) -> Option<RawDelivery> {
        self.recv().await
    }
}
