//! Durable pull consumers bound to a single subject.

use crate::nats::error::NatsError;
use async_nats::jetstream::consumer::pull::Config as ConsumerConfig;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy};
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::Context;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ack must arrive within this window or the server redelivers.
const ACK_WAIT: Duration = Duration::from_secs(30);

/// Redeliveries before the server stops trying.
const MAX_DELIVER: i64 = 3;

/// Outstanding unacked messages per consumer.
const MAX_ACK_PENDING: i64 = 1000;

/// Durable consumer name for a subject.
///
/// Deterministic so that multiple gateway instances share the consumer
/// and load-balance deliveries.
pub fn consumer_name(subject: &str) -> String {
    format!("pull-consumer-{}", subject.replace('.', "-"))
}

/// Stream name backing a subject.
pub fn stream_name(subject: &str) -> String {
    subject.replace('.', "_").to_uppercase()
}

/// A durable pull consumer on one subject.
pub struct SubjectConsumer {
    jetstream: Arc<Context>,
    subject: String,
}

impl SubjectConsumer {
    pub fn new(jetstream: Arc<Context>, subject: impl Into<String>) -> Self {
        Self {
            jetstream,
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Ensure the backing stream exists, creating it if necessary.
    pub async fn ensure_stream(&self) -> Result<(), NatsError> {
        let name = stream_name(&self.subject);

        match self.jetstream.get_stream(&name).await {
            Ok(_) => {
                debug!(stream = %name, "Stream already exists");
                Ok(())
            }
            Err(_) => {
                info!(stream = %name, subject = %self.subject, "Creating stream");

                self.jetstream
                    .create_stream(StreamConfig {
                        name: name.clone(),
                        subjects: vec![self.subject.clone()],
                        max_messages: 100_000,
                        max_age: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
                        ..Default::default()
                    })
                    .await
                    .map_err(NatsError::from_jetstream_error)?;

                info!(stream = %name, "Stream created");
                Ok(())
            }
        }
    }

    /// Ensure the durable consumer exists, creating it if necessary.
    pub async fn ensure_consumer(
        &self,
    ) -> Result<async_nats::jetstream::consumer::Consumer<ConsumerConfig>, NatsError> {
        let durable = consumer_name(&self.subject);
        let stream = self
            .jetstream
            .get_stream(stream_name(&self.subject))
            .await
            .map_err(NatsError::from_jetstream_error)?;

        match stream.get_consumer::<ConsumerConfig>(&durable).await {
            Ok(consumer) => {
                debug!(consumer = %durable, "Consumer already exists");
                Ok(consumer)
            }
            Err(_) => {
                info!(consumer = %durable, subject = %self.subject, "Creating consumer");

                let consumer = stream
                    .create_consumer(ConsumerConfig {
                        durable_name: Some(durable.clone()),
                        name: Some(durable.clone()),
                        deliver_policy: DeliverPolicy::New,
                        ack_policy: AckPolicy::Explicit,
                        ack_wait: ACK_WAIT,
                        max_deliver: MAX_DELIVER,
                        max_ack_pending: MAX_ACK_PENDING,
                        filter_subject: self.subject.clone(),
                        ..Default::default()
                    })
                    .await
                    .map_err(NatsError::from_jetstream_error)?;

                info!(consumer = %durable, "Consumer created");
                Ok(consumer)
            }
        }
    }

    /// Initialize stream and consumer.
    pub async fn init(&self) -> Result<(), NatsError> {
        self.ensure_stream().await?;
        self.ensure_consumer().await?;
        Ok(())
    }

    /// Fetch a batch of raw messages.
    ///
    /// Waits up to `max_wait` for the first message; an empty batch is a
    /// normal outcome.
    pub async fn fetch(
        &self,
        batch_size: usize,
        max_wait: Duration,
    ) -> Result<Vec<PulledMessage>, NatsError> {
        let consumer = self.ensure_consumer().await?;

        let mut messages = consumer
            .fetch()
            .max_messages(batch_size)
            .expires(max_wait)
            .messages()
            .await
            .map_err(NatsError::from_jetstream_error)?;

        let mut result = Vec::new();

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(message) => {
                    let (sequence, delivery_count) = match message.info() {
                        Ok(info) => (info.stream_sequence, info.delivered as u32),
                        Err(e) => {
                            warn!(error = %e, "Failed to get message info, using defaults");
                            (0, 1)
                        }
                    };
                    result.push(PulledMessage {
                        message,
                        sequence,
                        delivery_count,
                    });
                }
                Err(e) => {
                    return Err(NatsError::consumer_error(e.to_string()));
                }
            }
        }

        Ok(result)
    }
}

/// A raw message pulled from the bus, with ack/nak control.
pub struct PulledMessage {
    message: async_nats::jetstream::Message,
    /// Stream sequence number
    pub sequence: u64,
    /// Number of delivery attempts
    pub delivery_count: u32,
}

impl PulledMessage {
    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    /// Acknowledge the message (done with it, success or recorded failure).
    pub async fn ack(self) -> Result<(), NatsError> {
        self.message
            .ack()
            .await
            .map_err(|e| NatsError::consumer_error(e.to_string()))
    }

    /// Negative acknowledge (request redelivery).
    pub async fn nak(self, delay: Option<Duration>) -> Result<(), NatsError> {
        self.message
            .ack_with(async_nats::jetstream::AckKind::Nak(delay))
            .await
            .map_err(|e| NatsError::consumer_error(e.to_string()))
    }
}
