//! Normalized inbound message.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// An inbound bus message normalized for correlation.
///
/// Produced by the message processor after decoding the payload and
/// extracting the correlation id; everything beyond the id field is
/// opaque to the transport layer.
#[derive(Debug, Clone)]
pub struct MessageReceived {
    /// Listener that pulled the message
    pub listener_id: String,

    /// Subject the message arrived on
    pub subject: String,

    /// Gateway-assigned id for this delivery
    pub message_id: Uuid,

    /// Correlation id extracted from the configured JSON field
    pub extracted_id: String,

    /// Decoded JSON payload
    pub json_payload: Value,

    /// Raw payload exactly as it arrived on the bus
    pub raw_payload: String,

    /// When the gateway received the message
    pub timestamp: DateTime<Utc>,

    /// Stream sequence from the bus
    pub sequence: u64,

    /// Number of delivery attempts
    pub delivery_count: u32,
}

impl MessageReceived {
    /// Check if this is a redelivery.
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// Read a top-level string field from the payload.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        self.json_payload.get(field).and_then(Value::as_str)
    }
}
