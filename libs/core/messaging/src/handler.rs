//! Handler seam between the fetch loop and the domain.

use crate::error::ProcessingError;
use crate::message::MessageReceived;
use async_trait::async_trait;

/// Receives normalized messages from a pull fetcher.
///
/// The fetch loop decides ack/nak from the returned error's category:
/// `Ok` and permanent errors are acked, transient errors are nak'd or
/// dropped per consumer configuration.
///
/// # Example
///
/// ```rust,ignore
/// struct ResponseCorrelator { store: Arc<dyn RequestLogRepository> }
///
/// #[async_trait]
/// impl MessageHandler for ResponseCorrelator {
///     async fn on_message(&self, message: MessageReceived) -> Result<(), ProcessingError> {
///         self.correlate(message).await
///     }
///
///     fn name(&self) -> &'static str {
///         "response_correlator"
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a decoded message.
    async fn on_message(&self, message: MessageReceived) -> Result<(), ProcessingError>;

    /// Called when a message could not be decoded (invalid JSON or
    /// missing id field). The message is acked regardless; this hook
    /// exists so the domain can record the orphan.
    async fn on_decode_error(
        &self,
        _subject: &str,
        _sequence: u64,
        _raw: &[u8],
        _error: &ProcessingError,
    ) {
        // Default: no-op
    }

    /// Get the handler name (for logging and metrics labels).
    fn name(&self) -> &'static str;
}

/// A no-op handler for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpHandler;

#[async_trait]
impl MessageHandler for NoOpHandler {
    async fn on_message(&self, _message: MessageReceived) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop_handler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler;
        let message = MessageReceived {
            listener_id: "l".to_string(),
            subject: "s".to_string(),
            message_id: Uuid::new_v4(),
            extracted_id: "id".to_string(),
            json_payload: serde_json::json!({}),
            raw_payload: "{}".to_string(),
            timestamp: Utc::now(),
            sequence: 1,
            delivery_count: 1,
        };

        assert!(handler.on_message(message).await.is_ok());
        assert_eq!(handler.name(), "noop_handler");
    }
}
