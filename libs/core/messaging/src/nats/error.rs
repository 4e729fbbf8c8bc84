//! Error types for the NATS backend.

use crate::ErrorCategory;
use thiserror::Error;

/// Error that can occur in NATS operations.
#[derive(Debug, Error)]
pub enum NatsError {
    /// NATS connection error
    #[error("NATS connection error: {0}")]
    Connection(#[from] async_nats::ConnectError),

    /// JetStream error
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Consumer error
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NatsError {
    /// Get the error category for retry decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            // Config mistakes do not heal on retry
            NatsError::Config(_) => ErrorCategory::Permanent,
            NatsError::Serialization(_) => ErrorCategory::Permanent,

            // Everything touching the wire is worth retrying
            NatsError::Connection(_) => ErrorCategory::Transient,
            NatsError::JetStream(_) => ErrorCategory::Transient,
            NatsError::Consumer(_) => ErrorCategory::Transient,
            NatsError::Publish(_) => ErrorCategory::Transient,
        }
    }

    /// Create a JetStream error from an async_nats error.
    pub fn from_jetstream_error(error: impl std::fmt::Display) -> Self {
        Self::JetStream(error.to_string())
    }

    /// Create a publish error.
    pub fn publish_error(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create a consumer error.
    pub fn consumer_error(msg: impl Into<String>) -> Self {
        Self::Consumer(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let publish = NatsError::publish_error("no responders");
        assert_eq!(publish.category(), ErrorCategory::Transient);

        let consumer = NatsError::consumer_error("pull failed");
        assert_eq!(consumer.category(), ErrorCategory::Transient);

        let config = NatsError::Config("bad url".to_string());
        assert_eq!(config.category(), ErrorCategory::Permanent);
    }
}
