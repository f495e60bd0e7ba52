// NATS core subscription source. Core delivery (not JetStream) matches
// the pipeline's contract: messages are acknowledged at receipt and the
// subscription terminates as a signal, not an error.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use super::{MessageSource, RawDelivery};

pub struct NatsSource {
    // Keeps the connection alive for the lifetime of the subscription.
    _client: async_nats::Client,
    subscriber: async_nats::Subscriber,
}

impl NatsSource {
    pub async fn connect(url: &str, subject: &str) -> anyhow::Result<Self> {
        info!(url, subject, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        let subscriber = client.subscribe(subject.to_string()).await?;
        Ok(Self {
            _client: client,
            subscriber,
        })
    }
}

#[async_trait]
impl MessageSource for NatsSource {
    async fn next(&mut self) -> Option<RawDelivery> {
        self.subscriber
            .next()
            .await
            .map(|msg| RawDelivery { body: msg.payload })
    }
}
