//! Matches inbound messages to pending requests.

use async_trait::async_trait;
use chrono::Utc;
use messaging::{MessageHandler, MessageReceived, ProcessingError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::events::{EventEmitter, RequestEvent};
use crate::metrics::RequestMetrics;
use crate::models::{classify_subject, RequestLog, RequestStatus, ResponseKind};
use crate::repository::RequestLogRepository;

/// Correlates inbound messages to the persistent request log.
///
/// The pending row is the only source of matches; terminal rows absorb
/// later messages as observed duplicates. All transitions go through the
/// store's conditional update, so the first writer wins and losers are
/// counted, never retried.
pub struct CorrelationEngine {
    store: Arc<dyn RequestLogRepository>,
    emitter: EventEmitter,
    metrics: RequestMetrics,
    actor: String,
    unmatched_seq: AtomicU64,
}

impl CorrelationEngine {
    pub fn new(
        store: Arc<dyn RequestLogRepository>,
        emitter: EventEmitter,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            emitter,
            metrics: RequestMetrics::new(),
            actor: actor.into(),
            unmatched_seq: AtomicU64::new(0),
        }
    }

    /// Monotonic tag for orphan rows: epoch millis plus a process-local
    /// counter to break ties within one millisecond.
    fn unmatched_tag(&self) -> String {
        format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            self.unmatched_seq.fetch_add(1, Ordering::Relaxed)
        )
    }

    async fn record_unmatched(&self, subject: &str, payload: &str, error: &str) {
        let tag = self.unmatched_tag();
        match self
            .store
            .insert_unmatched(subject, payload, error, &tag)
            .await
        {
            Ok(orphan) => {
                debug!(request_id = %orphan.request_id, subject, "Orphan row persisted");
            }
            Err(e) => {
                // The listener must not fail on orphan bookkeeping
                warn!(subject, error = %e, "Failed to persist orphan row");
            }
        }
    }

    async fn correlate(&self, message: &MessageReceived) -> Result<(), ProcessingError> {
        let row = self
            .store
            .find_by_request_id(&message.extracted_id)
            .await
            .map_err(|e| ProcessingError::transient_with_source("request lookup failed", e))?;

        let Some(row) = row else {
            info!(
                extracted_id = %message.extracted_id,
                subject = %message.subject,
                "No matching request for inbound message"
            );
            self.record_unmatched(&message.subject, &message.raw_payload, "no matching request")
                .await;
            self.emitter.emit(RequestEvent::Unmatched {
                extracted_id: message.extracted_id.clone(),
                subject: message.subject.clone(),
            });
            return Ok(());
        };

        if row.status.is_terminal() {
            debug!(
                request_id = %row.request_id,
                status = %row.status,
                sequence = message.sequence,
                "Duplicate late response for terminal request"
            );
            return Ok(());
        }

        match classify_subject(&message.subject) {
            ResponseKind::Delayed => {
                self.store
                    .append_delayed(&row.request_id, &message.raw_payload, message.timestamp)
                    .await
                    .map_err(|e| {
                        ProcessingError::transient_with_source("delayed append failed", e)
                    })?;
                debug!(request_id = %row.request_id, "Recorded delayed response");
                Ok(())
            }
            ResponseKind::Success => {
                self.transition(&row, RequestStatus::Success, None, message)
                    .await
            }
            ResponseKind::Error => {
                let error_message = message
                    .string_field("error")
                    .unwrap_or("Unknown error")
                    .to_string();
                self.transition(&row, RequestStatus::Failed, Some(error_message), message)
                    .await
            }
        }
    }

    async fn transition(
        &self,
        row: &RequestLog,
        status: RequestStatus,
        error_message: Option<String>,
        message: &MessageReceived,
    ) -> Result<(), ProcessingError> {
        let updated = self
            .store
            .mark_response(
                &row.request_id,
                status,
                Some(message.raw_payload.clone()),
                error_message,
                message.timestamp,
                &self.actor,
            )
            .await
            .map_err(|e| ProcessingError::transient_with_source("response transition failed", e))?;

        if updated == 0 {
            // A concurrent response or the sweeper won; first writer wins
            self.metrics.duplicate_response(&message.subject);
            debug!(
                request_id = %row.request_id,
                sequence = message.sequence,
                "Lost transition race, response recorded as duplicate"
            );
            return Ok(());
        }

        let elapsed = (message.timestamp - row.request_timestamp)
            .to_std()
            .unwrap_or_default();
        self.metrics.request_duration(elapsed);
        match status {
            RequestStatus::Success => self.metrics.request_successful(&row.subject),
            RequestStatus::Failed => self.metrics.request_failed(&row.subject),
            _ => {}
        }

        info!(
            request_id = %row.request_id,
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request resolved"
        );

        self.emitter.emit(RequestEvent::Completed {
            request_id: row.request_id.clone(),
            status,
        });

        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CorrelationEngine {
    async fn on_message(&self, message: MessageReceived) -> Result<(), ProcessingError> {
        self.correlate(&message).await
    }

    async fn on_decode_error(
        &self,
        subject: &str,
        sequence: u64,
        raw: &[u8],
        error: &ProcessingError,
    ) {
        warn!(subject, sequence, error = %error, "Undecodable inbound message");
        self.record_unmatched(
            subject,
            &String::from_utf8_lossy(raw),
            &error.to_string(),
        )
        .await;
    }

    fn name(&self) -> &'static str {
        "correlation_engine"
    }
}
