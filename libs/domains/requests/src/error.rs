use thiserror::Error;

/// Error taxonomy for gateway request operations.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A request with this id already exists
    #[error("Duplicate request id: {0}")]
    DuplicateRequestId(String),

    /// Datastore failure; fatal to the current operation only
    #[error("Storage error: {0}")]
    Storage(String),

    /// Bus unreachable or publish failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Rejected at the API edge; never reaches the bus or store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller-facing bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request not found
    #[error("Request not found: {0}")]
    NotFound(String),
}

pub type RequestResult<T> = Result<T, RequestError>;

impl From<sea_orm::DbErr> for RequestError {
    fn from(err: sea_orm::DbErr) -> Self {
        RequestError::Storage(err.to_string())
    }
}

impl From<messaging::NatsError> for RequestError {
    fn from(err: messaging::NatsError) -> Self {
        RequestError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_maps_to_storage() {
        let err: RequestError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, RequestError::Storage(_)));
        assert!(err.to_string().contains("boom"));
    }
}
