//! Batched pull loop, one per active listener.

use crate::backoff::RetryPolicy;
use crate::handler::MessageHandler;
use crate::nats::consumer::{PulledMessage, SubjectConsumer};
use crate::nats::metrics::ConsumerMetrics;
use crate::nats::processor::MessageProcessor;
use crate::ErrorCategory;
use core_config::gateway::ConsumerTuning;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pulls batches from a durable consumer and feeds them to a handler.
///
/// The loop honors its `running` flag between pulls, never mid-batch.
/// Pull failures are transient: the loop backs off exponentially and
/// keeps going until told to stop.
pub struct PullFetcher {
    listener_id: String,
    consumer: SubjectConsumer,
    processor: MessageProcessor,
    handler: Arc<dyn MessageHandler>,
    tuning: ConsumerTuning,
    policy: RetryPolicy,
    metrics: ConsumerMetrics,
    running: watch::Receiver<bool>,
}

impl PullFetcher {
    pub fn new(
        listener_id: impl Into<String>,
        consumer: SubjectConsumer,
        id_field: &str,
        handler: Arc<dyn MessageHandler>,
        tuning: ConsumerTuning,
        running: watch::Receiver<bool>,
    ) -> Self {
        let listener_id = listener_id.into();
        let metrics = ConsumerMetrics::new(consumer.subject());
        let processor = MessageProcessor::new(listener_id.clone(), id_field);
        let policy = RetryPolicy::from_tuning(&tuning);

        Self {
            listener_id,
            consumer,
            processor,
            handler,
            tuning,
            policy,
            metrics,
            running,
        }
    }

    /// Run the fetch loop until the running flag flips to false.
    pub async fn run(mut self) {
        info!(
            listener_id = %self.listener_id,
            subject = %self.consumer.subject(),
            handler = self.handler.name(),
            "Starting pull fetcher"
        );

        let mut consecutive_errors: u32 = 0;

        while *self.running.borrow() {
            match self
                .consumer
                .fetch(self.tuning.batch_size, self.tuning.max_wait)
                .await
            {
                Ok(batch) => {
                    if consecutive_errors > 0 {
                        info!(
                            listener_id = %self.listener_id,
                            after_errors = consecutive_errors,
                            "Pull recovered"
                        );
                    }
                    consecutive_errors = 0;

                    if !batch.is_empty() {
                        self.metrics.pulled(batch.len() as u64, "ok");
                        debug!(
                            listener_id = %self.listener_id,
                            count = batch.len(),
                            "Pulled batch"
                        );
                    }

                    for message in batch {
                        self.handle_message(message).await;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.metrics.error("pull");

                    warn!(
                        listener_id = %self.listener_id,
                        error = %e,
                        consecutive_errors,
                        "Pull failed, backing off"
                    );

                    if let Some(delay) = self.policy.next_delay(consecutive_errors) {
                        if !self.sleep_unless_stopped(delay).await {
                            break;
                        }
                    }
                    continue;
                }
            }

            if !self.tuning.poll_interval.is_zero()
                && !self.sleep_unless_stopped(self.tuning.poll_interval).await
            {
                break;
            }
        }

        info!(listener_id = %self.listener_id, "Pull fetcher stopped");
    }

    /// Process one message: decode, hand off, ack/nak.
    async fn handle_message(&self, message: PulledMessage) {
        let subject = self.consumer.subject().to_string();
        let sequence = message.sequence;

        match self.processor.process(
            &subject,
            message.payload(),
            sequence,
            message.delivery_count,
        ) {
            Ok(received) => match self.handler.on_message(received).await {
                Ok(()) => {
                    self.metrics.processed("ok");
                    if let Err(e) = message.ack().await {
                        warn!(sequence, error = %e, "Failed to ack message");
                    }
                }
                Err(e) => {
                    self.metrics.processed("error");
                    self.metrics.error(&e.category().to_string());

                    match e.category() {
                        // Redelivery would fail the same way; record and move on
                        ErrorCategory::Permanent => {
                            warn!(sequence, error = %e, "Handler failed permanently, acking");
                            if let Err(ack_err) = message.ack().await {
                                warn!(sequence, error = %ack_err, "Failed to ack message");
                            }
                        }
                        ErrorCategory::Transient => {
                            if self.tuning.nak_on_error {
                                debug!(sequence, error = %e, "Handler failed, nak for redelivery");
                                if let Err(nak_err) = message.nak(None).await {
                                    warn!(sequence, error = %nak_err, "Failed to nak message");
                                }
                            } else {
                                warn!(sequence, error = %e, "Handler failed, dropping message");
                                if let Err(ack_err) = message.ack().await {
                                    warn!(sequence, error = %ack_err, "Failed to ack message");
                                }
                            }
                        }
                    }
                }
            },
            Err(e) => {
                // Undecodable messages are acked; the handler records the orphan
                self.metrics.error("serialization");
                self.handler
                    .on_decode_error(&subject, sequence, message.payload(), &e)
                    .await;
                if let Err(ack_err) = message.ack().await {
                    warn!(sequence, error = %ack_err, "Failed to ack undecodable message");
                }
            }
        }
    }

    /// Sleep, waking early if the running flag changes. Returns whether
    /// the loop should keep going.
    async fn sleep_unless_stopped(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = self.running.changed() => {
                // A closed channel means the registry is gone
                if changed.is_err() {
                    return false;
                }
            }
        }
        *self.running.borrow()
    }
}
