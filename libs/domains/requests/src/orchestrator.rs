//! Binds a request to its response path: persist, arm listener, publish.

use async_trait::async_trait;
use chrono::Utc;
use messaging::nats::{NatsPublisher, PublishAck};
use messaging::{ErrorCategory, NatsError};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RequestError, RequestResult};
use crate::events::{EventEmitter, RequestEvent};
use crate::listener::ListenerControl;
use crate::metrics::RequestMetrics;
use crate::models::{NewRequest, RequestStatus};
use crate::repository::RequestLogRepository;

/// Persistent-publish seam, implemented by the NATS publisher.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<PublishAck, NatsError>;
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<PublishAck, NatsError> {
        NatsPublisher::publish(self, subject, payload).await
    }
}

/// Accepts requests, records them and hands them to the bus.
///
/// Deliberately asynchronous: the caller gets the request id back and
/// polls the store (or subscribes to events) for resolution. Timeouts
/// belong to the sweeper, never to a blocking wait here.
pub struct RequestOrchestrator {
    store: Arc<dyn RequestLogRepository>,
    publisher: Arc<dyn Publisher>,
    listeners: Arc<dyn ListenerControl>,
    emitter: EventEmitter,
    metrics: RequestMetrics,
    actor: String,
}

impl RequestOrchestrator {
    pub fn new(
        store: Arc<dyn RequestLogRepository>,
        publisher: Arc<dyn Publisher>,
        listeners: Arc<dyn ListenerControl>,
        emitter: EventEmitter,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            publisher,
            listeners,
            emitter,
            metrics: RequestMetrics::new(),
            actor: actor.into(),
        }
    }

    /// Submit a request. Returns the request id; resolution is durable
    /// and survives process restart.
    pub async fn send_request(&self, input: NewRequest) -> RequestResult<String> {
        validate(&input)?;

        let request_id = resolve_request_id(&input);

        let actor = input.created_by.as_deref().unwrap_or(&self.actor);
        self.store
            .insert_pending(&input, &request_id, actor)
            .await?;

        // Arm the listener before the request leaves, so a fast response
        // cannot arrive without a consumer to catch it
        if let (Some(response_subject), Some(response_id_field)) =
            (&input.response_subject, &input.response_id_field)
        {
            self.listeners
                .ensure_listener_active(response_subject, response_id_field)
                .await?;
        }

        match self.publish_with_retry(&input.subject, input.payload.as_bytes()).await {
            Ok(ack) => {
                info!(
                    request_id = %request_id,
                    subject = %input.subject,
                    stream = %ack.stream,
                    sequence = ack.sequence,
                    "Request published"
                );
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Publish failed, marking request ERROR");
                // CAS to ERROR; a lost race here means something else
                // already resolved the row, which is fine
                let _ = self
                    .store
                    .mark_response(
                        &request_id,
                        RequestStatus::Error,
                        None,
                        Some(format!("publish failed: {}", e)),
                        Utc::now(),
                        &self.actor,
                    )
                    .await;
                return Err(RequestError::Connection(e.to_string()));
            }
        }

        self.metrics.request_registered(&input.subject);
        self.emitter.emit(RequestEvent::Registered {
            request_id: request_id.clone(),
            subject: input.subject.clone(),
        });

        Ok(request_id)
    }

    /// Publish with one local retry on a transient connection failure.
    async fn publish_with_retry(
        &self,
        subject: &str,
        payload: &[u8],
    ) -> Result<PublishAck, NatsError> {
        match self.publisher.publish(subject, payload).await {
            Ok(ack) => Ok(ack),
            Err(e) if e.category() == ErrorCategory::Transient => {
                warn!(subject, error = %e, "Publish failed, retrying once");
                self.publisher.publish(subject, payload).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Resolve the id responses will be correlated on.
///
/// Precedence: explicit caller id, then the bound id field inside the
/// request payload (responses echo it back), then a generated UUID.
fn resolve_request_id(input: &NewRequest) -> String {
    if let Some(request_id) = &input.request_id {
        return request_id.clone();
    }

    if let Some(id_field) = &input.response_id_field {
        if let Ok(payload) = serde_json::from_str::<serde_json::Value>(&input.payload) {
            if let Some(id) = payload.get(id_field).and_then(|v| v.as_str()) {
                return id.to_string();
            }
        }
    }

    Uuid::new_v4().to_string()
}

fn validate(input: &NewRequest) -> RequestResult<()> {
    if input.subject.trim().is_empty() {
        return Err(RequestError::Validation("subject must not be empty".to_string()));
    }
    if input.payload.is_empty() {
        return Err(RequestError::Validation("payload must not be empty".to_string()));
    }
    match (&input.response_subject, &input.response_id_field) {
        (Some(subject), _) if subject.trim().is_empty() => Err(RequestError::Validation(
            "response subject must not be empty".to_string(),
        )),
        (_, Some(field)) if field.trim().is_empty() => Err(RequestError::Validation(
            "response id field must not be empty".to_string(),
        )),
        (Some(_), None) | (None, Some(_)) => Err(RequestError::Validation(
            "response subject and id field must be bound together".to_string(),
        )),
        _ => Ok(()),
    }
}
