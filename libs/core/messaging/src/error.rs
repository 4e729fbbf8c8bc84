//! Error types for message processing.

use std::fmt;
use thiserror::Error;

/// Error categories determine what the fetch loop does with a message
/// whose handler failed.
///
/// - **Transient**: temporary failure (storage hiccup, downstream
///   unavailable); the message may be redelivered
/// - **Permanent**: unrecoverable for this message (undecodable payload,
///   missing id field); redelivery would fail the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Permanent => write!(f, "permanent"),
        }
    }
}

/// Error that can occur while processing an inbound message.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Transient error (storage hiccup, temporary unavailability)
    #[error("transient error: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Permanent error (invalid data, business rule failure)
    #[error("permanent error: {message}")]
    Permanent {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Payload was not valid UTF-8 JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configured id field was absent or not a string
    #[error("missing id field '{field}' in message payload")]
    MissingIdField { field: String },
}

impl ProcessingError {
    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient error with a source.
    pub fn transient_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a permanent error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
            source: None,
        }
    }

    /// Create a permanent error with a source.
    pub fn permanent_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Permanent {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProcessingError::Transient { .. } => ErrorCategory::Transient,
            ProcessingError::Permanent { .. } => ErrorCategory::Permanent,
            ProcessingError::Serialization(_) => ErrorCategory::Permanent,
            ProcessingError::MissingIdField { .. } => ErrorCategory::Permanent,
        }
    }
}
