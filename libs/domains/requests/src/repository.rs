use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::RequestResult;
use crate::lock::RecoveryLock;
use crate::models::{NewRequest, RequestLog, RequestStatus};

/// Repository trait for the durable request log.
///
/// Terminal transitions are compare-and-set: they update only rows still
/// in PENDING and report rows_affected. A result of 0 means a concurrent
/// writer won the race and is NOT an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestLogRepository: Send + Sync {
    /// Create a PENDING row. Fails with `DuplicateRequestId` when the id
    /// already exists.
    async fn insert_pending(
        &self,
        input: &NewRequest,
        request_id: &str,
        actor: &str,
    ) -> RequestResult<RequestLog>;

    /// Conditionally transition PENDING -> `status`, recording the
    /// response payload and timestamp. Returns rows updated (0 or 1).
    async fn mark_response(
        &self,
        request_id: &str,
        status: RequestStatus,
        payload: Option<String>,
        error_message: Option<String>,
        now: DateTime<Utc>,
        actor: &str,
    ) -> RequestResult<u64>;

    /// Conditionally transition PENDING -> TIMEOUT. Returns rows updated.
    async fn mark_timeout(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
        actor: &str,
    ) -> RequestResult<u64>;

    /// Record a delayed-response payload without leaving PENDING.
    /// Returns rows updated.
    async fn append_delayed(
        &self,
        request_id: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> RequestResult<u64>;

    async fn find_by_request_id(&self, request_id: &str) -> RequestResult<Option<RequestLog>>;

    async fn find_by_status(&self, status: RequestStatus) -> RequestResult<Vec<RequestLog>>;

    /// PENDING rows overdue at `now`: `request_timestamp <= threshold`,
    /// or past their per-request `timeout_duration` when one is set.
    /// Bounded by `limit`.
    async fn find_timed_out(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u64,
    ) -> RequestResult<Vec<RequestLog>>;

    /// Persist an orphan row for an inbound message that matched nothing.
    /// The row gets `request_id = "UNMATCHED_" + tag` and status ERROR.
    async fn insert_unmatched(
        &self,
        subject: &str,
        payload: &str,
        error: &str,
        tag: &str,
    ) -> RequestResult<RequestLog>;
}

/// Repository trait for the lease-based recovery lock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecoveryLockRepository: Send + Sync {
    /// Try to take the lock for `pod_id` with the given TTL.
    ///
    /// Succeeds when no row exists, or the existing lease is EXPIRED or
    /// past its expiry. Returns whether this pod now owns the lock.
    async fn try_acquire(&self, pod_id: &str, ttl: Duration) -> RequestResult<bool>;

    /// Release the lock after recovery finished.
    async fn complete(&self, pod_id: &str) -> RequestResult<()>;

    /// Current lock row, if any.
    async fn find(&self) -> RequestResult<Option<RecoveryLock>>;
}
