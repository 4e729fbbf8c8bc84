//! Persistent publisher for outbound requests.

use crate::nats::consumer::stream_name;
use crate::nats::error::NatsError;
use crate::nats::metrics::PublisherMetrics;
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Acknowledgement of a persistent publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    /// Stream that stored the message
    pub stream: String,

    /// Sequence assigned by the stream
    pub sequence: u64,
}

/// Publishes messages with a JetStream persistence ack.
pub struct NatsPublisher {
    jetstream: Arc<Context>,
    metrics: PublisherMetrics,
}

impl NatsPublisher {
    pub fn new(jetstream: Arc<Context>) -> Self {
        Self {
            jetstream,
            metrics: PublisherMetrics::new(),
        }
    }

    /// Ensure a stream covering `subject` exists, creating it if necessary.
    ///
    /// Publishing without a covering stream would be fire-and-forget; the
    /// gateway requires every request durably stored.
    pub async fn ensure_stream(&self, subject: &str) -> Result<(), NatsError> {
        let name = stream_name(subject);

        if self.jetstream.get_stream(&name).await.is_ok() {
            return Ok(());
        }

        debug!(stream = %name, subject = %subject, "Creating stream for publish subject");

        self.jetstream
            .create_stream(StreamConfig {
                name,
                subjects: vec![subject.to_string()],
                max_messages: 100_000,
                max_age: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
                ..Default::default()
            })
            .await
            .map_err(NatsError::from_jetstream_error)?;

        Ok(())
    }

    /// Publish a payload and wait for the persistence ack.
    pub async fn publish(&self, subject: &str, payload: &[u8]) -> Result<PublishAck, NatsError> {
        self.ensure_stream(subject).await?;

        let start = Instant::now();

        let ack = self
            .jetstream
            .publish(subject.to_string(), payload.to_vec().into())
            .await
            .map_err(|e| NatsError::publish_error(e.to_string()))?
            .await
            .map_err(|e| NatsError::publish_error(e.to_string()))?;

        self.metrics.published(subject, start.elapsed());

        debug!(
            subject = %subject,
            stream = %ack.stream,
            sequence = ack.sequence,
            "Published message"
        );

        Ok(PublishAck {
            stream: ack.stream,
            sequence: ack.sequence,
        })
    }
}

impl Clone for NatsPublisher {
    fn clone(&self) -> Self {
        Self {
            jetstream: self.jetstream.clone(),
            metrics: self.metrics.clone(),
        }
    }
}
