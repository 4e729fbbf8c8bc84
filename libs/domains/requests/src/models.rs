use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum::{Display, EnumString};

/// Request lifecycle status.
///
/// Transitions form a DAG rooted at `Pending`; every other status is
/// absorbing. The only legal writes are `Pending -> terminal`, guarded by
/// a conditional update.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    Hash,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "request_status")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RequestStatus {
    /// Awaiting a correlated response or timeout
    #[default]
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Correlated response arrived on a success subject
    #[sea_orm(string_value = "SUCCESS")]
    Success,
    /// Correlated response arrived on an error subject
    #[sea_orm(string_value = "FAILED")]
    Failed,
    /// The sweeper marked the request overdue
    #[sea_orm(string_value = "TIMEOUT")]
    Timeout,
    /// Publish failure, or an orphan row for an unmatched response
    #[sea_orm(string_value = "ERROR")]
    Error,
}

impl RequestStatus {
    /// Terminal statuses are absorbing.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A durable request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: i64,
    pub request_id: String,
    pub subject: String,
    pub request_payload: String,
    pub response_subject: Option<String>,
    pub response_id_field: Option<String>,
    pub status: RequestStatus,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: Option<DateTime<Utc>>,
    pub response_payload: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    /// Per-request timeout override in milliseconds
    pub timeout_duration: Option<i64>,
    pub created_by: String,
    pub updated_by: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl RequestLog {
    /// The listener key this row binds to, when a response path was given.
    pub fn listener_key(&self) -> Option<ListenerKey> {
        match (&self.response_subject, &self.response_id_field) {
            (Some(subject), Some(id_field)) => Some(ListenerKey::new(subject, id_field)),
            _ => None,
        }
    }
}

/// Input for registering a new request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    /// Caller-supplied id; generated by the gateway when absent
    pub request_id: Option<String>,
    pub subject: String,
    pub payload: String,
    pub response_subject: Option<String>,
    pub response_id_field: Option<String>,
    /// Per-request timeout override
    pub timeout: Option<Duration>,
    /// Audit actor; defaults to the gateway actor tag
    pub created_by: Option<String>,
}

impl NewRequest {
    pub fn new(subject: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            request_id: None,
            subject: subject.into(),
            payload: payload.into(),
            response_subject: None,
            response_id_field: None,
            timeout: None,
            created_by: None,
        }
    }

    /// Bind the response path used for correlation.
    pub fn with_response(
        mut self,
        response_subject: impl Into<String>,
        response_id_field: impl Into<String>,
    ) -> Self {
        self.response_subject = Some(response_subject.into());
        self.response_id_field = Some(response_id_field.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Identity of a logical listener: one per `(subject, id_field)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub subject: String,
    pub id_field: String,
}

impl ListenerKey {
    pub fn new(subject: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            id_field: id_field.into(),
        }
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.subject, self.id_field)
    }
}

/// How a response subject classifies the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// `*.success.*` and anything unrecognized
    Success,
    /// `*.error.*`
    Error,
    /// `*.delayed.*` - payload recorded, no state transition
    Delayed,
}

/// Classify a subject by its segment convention.
pub fn classify_subject(subject: &str) -> ResponseKind {
    for segment in subject.split('.') {
        match segment {
            "error" => return ResponseKind::Error,
            "delayed" => return ResponseKind::Delayed,
            _ => {}
        }
    }
    ResponseKind::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Success.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
        assert!(RequestStatus::Timeout.is_terminal());
        assert!(RequestStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_display_uppercase() {
        assert_eq!(RequestStatus::Pending.to_string(), "PENDING");
        assert_eq!(RequestStatus::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_classify_subject() {
        assert_eq!(
            classify_subject("orders.response.success"),
            ResponseKind::Success
        );
        assert_eq!(
            classify_subject("orders.response.error"),
            ResponseKind::Error
        );
        assert_eq!(
            classify_subject("orders.delayed.response"),
            ResponseKind::Delayed
        );
        // Unrecognized subjects resolve as success
        assert_eq!(classify_subject("orders.response"), ResponseKind::Success);
        assert_eq!(classify_subject("plain"), ResponseKind::Success);
    }

    #[test]
    fn test_classify_subject_segment_not_substring() {
        // "errors" is not the "error" segment
        assert_eq!(
            classify_subject("orders.errors.response"),
            ResponseKind::Success
        );
    }

    #[test]
    fn test_listener_key_display() {
        let key = ListenerKey::new("orders.response", "orderId");
        assert_eq!(key.to_string(), "orders.response::orderId");
    }

    #[test]
    fn test_new_request_builder() {
        let request = NewRequest::new("orders.create", r#"{"orderId":"o-1"}"#)
            .with_response("orders.response.success", "orderId")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(request.subject, "orders.create");
        assert_eq!(
            request.response_subject.as_deref(),
            Some("orders.response.success")
        );
        assert_eq!(request.response_id_field.as_deref(), Some("orderId"));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
        assert!(request.request_id.is_none());
    }
}
