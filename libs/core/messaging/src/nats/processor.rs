//! Decodes raw bus messages and extracts the correlation id.

use crate::error::ProcessingError;
use crate::message::MessageReceived;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

/// Turns raw payload bytes into a [`MessageReceived`].
///
/// The processor only decodes JSON and reads the configured top-level id
/// field; it does not validate the rest of the envelope.
#[derive(Debug, Clone)]
pub struct MessageProcessor {
    listener_id: String,
    id_field: String,
}

impl MessageProcessor {
    pub fn new(listener_id: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            listener_id: listener_id.into(),
            id_field: id_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Decode a message and extract the correlation id.
    pub fn process(
        &self,
        subject: &str,
        payload: &[u8],
        sequence: u64,
        delivery_count: u32,
    ) -> Result<MessageReceived, ProcessingError> {
        let json_payload: Value = serde_json::from_slice(payload)?;

        let extracted_id = json_payload
            .get(&self.id_field)
            .and_then(Value::as_str)
            .ok_or_else(|| ProcessingError::MissingIdField {
                field: self.id_field.clone(),
            })?
            .to_string();

        Ok(MessageReceived {
            listener_id: self.listener_id.clone(),
            subject: subject.to_string(),
            message_id: Uuid::new_v4(),
            extracted_id,
            raw_payload: String::from_utf8_lossy(payload).into_owned(),
            json_payload,
            timestamp: Utc::now(),
            sequence,
            delivery_count,
        })
    }
}
