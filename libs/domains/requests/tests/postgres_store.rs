//! Conditional-update semantics of the PostgreSQL request log.
//!
//! These tests run against a real PostgreSQL container: the whole point
//! of the store is row-level atomicity, which a mock cannot exercise.

use chrono::{Duration as ChronoDuration, Utc};
use domain_requests::lock::LockStatus;
use domain_requests::{
    NewRequest, PgRecoveryLockRepository, PgRequestLogRepository, RecoveryLockRepository,
    RequestError, RequestLogRepository, RequestStatus,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::time::Duration;
use test_utils::TestDatabase;

fn request(subject: &str) -> NewRequest {
    NewRequest::new(subject, r#"{"orderId":"o-1"}"#)
        .with_response("orders.response.success", "orderId")
}

async fn insert(store: &PgRequestLogRepository, request_id: &str) {
    store
        .insert_pending(&request("orders.create"), request_id, "test")
        .await
        .expect("insert_pending failed");
}

#[tokio::test]
async fn test_insert_and_find_round_trip() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    insert(&store, "r-1").await;

    let row = store
        .find_by_request_id("r-1")
        .await
        .unwrap()
        .expect("row missing");
    assert_eq!(row.status, RequestStatus::Pending);
    assert_eq!(row.subject, "orders.create");
    assert_eq!(
        row.response_subject.as_deref(),
        Some("orders.response.success")
    );
    assert_eq!(row.response_id_field.as_deref(), Some("orderId"));
    assert_eq!(row.retry_count, 0);
    assert_eq!(row.created_by, "test");
}

#[tokio::test]
async fn test_duplicate_request_id_rejected() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    insert(&store, "r-1").await;

    let err = store
        .insert_pending(&request("orders.create"), "r-1", "test")
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::DuplicateRequestId(id) if id == "r-1"));
}

#[tokio::test]
async fn test_mark_response_is_compare_and_set() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    insert(&store, "r-1").await;

    let first = store
        .mark_response(
            "r-1",
            RequestStatus::Success,
            Some(r#"{"orderId":"o-1","ok":true}"#.to_string()),
            None,
            Utc::now(),
            "engine",
        )
        .await
        .unwrap();
    assert_eq!(first, 1);

    // Second writer loses: 0 rows, no error
    let second = store
        .mark_response(
            "r-1",
            RequestStatus::Failed,
            Some("{}".to_string()),
            Some("late".to_string()),
            Utc::now(),
            "engine",
        )
        .await
        .unwrap();
    assert_eq!(second, 0);

    let row = store.find_by_request_id("r-1").await.unwrap().unwrap();
    assert_eq!(row.status, RequestStatus::Success);
    assert_eq!(
        row.response_payload.as_deref(),
        Some(r#"{"orderId":"o-1","ok":true}"#)
    );
    assert!(row.response_timestamp.is_some());
    assert_eq!(row.updated_by, "engine");
}

#[tokio::test]
async fn test_timeout_and_response_race_single_winner() {
    let db = TestDatabase::new().await;
    let store = Arc::new(PgRequestLogRepository::new(db.connection()));

    insert(&store, "r-race").await;

    // Fire a response and a timeout concurrently; conditional updates
    // guarantee exactly one winner
    let response_store = store.clone();
    let response = tokio::spawn(async move {
        response_store
            .mark_response(
                "r-race",
                RequestStatus::Success,
                Some("{}".to_string()),
                None,
                Utc::now(),
                "engine",
            )
            .await
            .unwrap()
    });
    let timeout_store = store.clone();
    let timeout = tokio::spawn(async move {
        timeout_store
            .mark_timeout("r-race", Utc::now(), "sweeper")
            .await
            .unwrap()
    });

    let (response_updated, timeout_updated) = (response.await.unwrap(), timeout.await.unwrap());
    assert_eq!(
        response_updated + timeout_updated,
        1,
        "exactly one transition must win"
    );

    let row = store.find_by_request_id("r-race").await.unwrap().unwrap();
    assert!(row.status.is_terminal());
    assert!(matches!(
        row.status,
        RequestStatus::Success | RequestStatus::Timeout
    ));
}

#[tokio::test]
async fn test_append_delayed_keeps_row_pending() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    insert(&store, "r-1").await;

    let updated = store
        .append_delayed("r-1", r#"{"note":"still working"}"#, Utc::now())
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let row = store.find_by_request_id("r-1").await.unwrap().unwrap();
    assert_eq!(row.status, RequestStatus::Pending);
    assert_eq!(
        row.response_payload.as_deref(),
        Some(r#"{"note":"still working"}"#)
    );
    assert!(row.response_timestamp.is_some());

    // The delayed row still times out or resolves later
    let resolved = store
        .mark_response(
            "r-1",
            RequestStatus::Success,
            Some("{}".to_string()),
            None,
            Utc::now(),
            "engine",
        )
        .await
        .unwrap();
    assert_eq!(resolved, 1);
}

#[tokio::test]
async fn test_find_timed_out_boundary_is_inclusive() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    insert(&store, "r-old").await;

    let row = store.find_by_request_id("r-old").await.unwrap().unwrap();
    let now = Utc::now();

    // threshold == request_timestamp: the row is overdue (<=)
    let overdue = store
        .find_timed_out(row.request_timestamp, now, 1000)
        .await
        .unwrap();
    assert!(overdue.iter().any(|r| r.request_id == "r-old"));

    // threshold strictly before the row: not overdue
    let not_overdue = store
        .find_timed_out(
            row.request_timestamp - ChronoDuration::milliseconds(1),
            now,
            1000,
        )
        .await
        .unwrap();
    assert!(!not_overdue.iter().any(|r| r.request_id == "r-old"));
}

#[tokio::test]
async fn test_find_timed_out_honors_per_request_override() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    // 50ms budget on this request
    store
        .insert_pending(
            &request("orders.create").with_timeout(Duration::from_millis(50)),
            "r-short",
            "test",
        )
        .await
        .unwrap();

    // Default threshold far in the past, so only the override can match
    let now = Utc::now();
    let threshold = now - ChronoDuration::seconds(3600);

    let before_budget = store.find_timed_out(threshold, now, 1000).await.unwrap();
    assert!(!before_budget.iter().any(|r| r.request_id == "r-short"));

    tokio::time::sleep(Duration::from_millis(100)).await;

    let now = Utc::now();
    let after_budget = store.find_timed_out(threshold, now, 1000).await.unwrap();
    assert!(after_budget.iter().any(|r| r.request_id == "r-short"));
}

#[tokio::test]
async fn test_find_timed_out_respects_limit_and_skips_terminal() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    for i in 0..5 {
        insert(&store, &format!("r-{}", i)).await;
    }
    store
        .mark_response(
            "r-0",
            RequestStatus::Success,
            Some("{}".to_string()),
            None,
            Utc::now(),
            "engine",
        )
        .await
        .unwrap();

    let now = Utc::now() + ChronoDuration::seconds(60);
    let threshold = now;

    let limited = store.find_timed_out(threshold, now, 2).await.unwrap();
    assert_eq!(limited.len(), 2);

    let all = store.find_timed_out(threshold, now, 1000).await.unwrap();
    // r-0 is terminal and must never come back as overdue
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|r| r.status == RequestStatus::Pending));
}

#[tokio::test]
async fn test_insert_unmatched_orphan_row() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    let orphan = store
        .insert_unmatched(
            "orders.response.success",
            r#"{"orderId":"o-unknown"}"#,
            "no matching request",
            "1700000000000_0",
        )
        .await
        .unwrap();

    assert!(orphan.request_id.starts_with("UNMATCHED_"));
    assert_eq!(orphan.status, RequestStatus::Error);
    assert_eq!(orphan.error_message.as_deref(), Some("no matching request"));
    assert_eq!(
        orphan.response_payload.as_deref(),
        Some(r#"{"orderId":"o-unknown"}"#)
    );

    // Orphans are terminal: no listener key, never swept
    assert!(orphan.listener_key().is_none());
}

#[tokio::test]
async fn test_find_by_status() {
    let db = TestDatabase::new().await;
    let store = PgRequestLogRepository::new(db.connection());

    insert(&store, "r-1").await;
    insert(&store, "r-2").await;
    store
        .mark_timeout("r-2", Utc::now(), "sweeper")
        .await
        .unwrap();

    let pending = store.find_by_status(RequestStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, "r-1");

    let timed_out = store.find_by_status(RequestStatus::Timeout).await.unwrap();
    assert_eq!(timed_out.len(), 1);
    assert_eq!(timed_out[0].request_id, "r-2");
}

#[tokio::test]
async fn test_recovery_lock_single_owner() {
    let db = TestDatabase::new().await;
    let lock = PgRecoveryLockRepository::new(db.connection());
    let ttl = Duration::from_secs(60);

    // First pod wins, second is blocked by the live lease
    assert!(lock.try_acquire("pod-a", ttl).await.unwrap());
    assert!(!lock.try_acquire("pod-b", ttl).await.unwrap());

    let row = lock.find().await.unwrap().unwrap();
    assert_eq!(row.pod_id, "pod-a");
    assert_eq!(row.status, LockStatus::Active);

    // Release: the lock becomes acquirable again
    lock.complete("pod-a").await.unwrap();
    let row = lock.find().await.unwrap().unwrap();
    assert_eq!(row.status, LockStatus::Completed);

    assert!(lock.try_acquire("pod-b", ttl).await.unwrap());
    let row = lock.find().await.unwrap().unwrap();
    assert_eq!(row.pod_id, "pod-b");
}

#[tokio::test]
async fn test_recovery_lock_expired_lease_is_stolen() {
    let db = TestDatabase::new().await;
    let lock = PgRecoveryLockRepository::new(db.connection());

    assert!(lock
        .try_acquire("pod-a", Duration::from_secs(60))
        .await
        .unwrap());

    // Lapse the lease by hand
    let expired_at = Utc::now() - ChronoDuration::seconds(1);
    domain_requests::lock::Entity::update_many()
        .col_expr(
            domain_requests::lock::Column::ExpiresAt,
            sea_orm::sea_query::Expr::value(expired_at),
        )
        .filter(domain_requests::lock::Column::PodId.eq("pod-a"))
        .exec(&db.connection())
        .await
        .unwrap();

    // A lapsed ACTIVE lease no longer blocks anyone
    assert!(lock
        .try_acquire("pod-b", Duration::from_secs(60))
        .await
        .unwrap());
    let row = lock.find().await.unwrap().unwrap();
    assert_eq!(row.pod_id, "pod-b");
    assert_eq!(row.status, LockStatus::Active);
}

#[tokio::test]
async fn test_lock_complete_requires_matching_pod() {
    let db = TestDatabase::new().await;
    let lock = PgRecoveryLockRepository::new(db.connection());

    assert!(lock
        .try_acquire("pod-a", Duration::from_secs(60))
        .await
        .unwrap());

    // A different pod cannot release someone else's lease
    lock.complete("pod-b").await.unwrap();
    let row = lock.find().await.unwrap().unwrap();
    assert_eq!(row.status, LockStatus::Active);

    lock.complete("pod-a").await.unwrap();
    let row = lock.find().await.unwrap().unwrap();
    assert_eq!(row.status, LockStatus::Completed);
}

#[tokio::test]
async fn test_only_one_concurrent_transition_succeeds_under_contention() {
    let db = TestDatabase::new().await;
    let store = Arc::new(PgRequestLogRepository::new(db.connection()));

    insert(&store, "r-many").await;

    // Ten concurrent writers, mixed kinds; exactly one row update total
    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                store
                    .mark_response(
                        "r-many",
                        RequestStatus::Success,
                        Some(format!(r#"{{"writer":{}}}"#, i)),
                        None,
                        Utc::now(),
                        "engine",
                    )
                    .await
                    .unwrap()
            } else {
                store
                    .mark_timeout("r-many", Utc::now(), "sweeper")
                    .await
                    .unwrap()
            }
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 1, "first writer wins, everyone else affects 0 rows");
}
