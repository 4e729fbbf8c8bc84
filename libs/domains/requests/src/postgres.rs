use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
    Statement,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::entity;
use crate::error::{RequestError, RequestResult};
use crate::lock::{self, LockStatus, RecoveryLock, RECOVERY_LOCK_KEY};
use crate::models::{NewRequest, RequestLog, RequestStatus};
use crate::repository::{RecoveryLockRepository, RequestLogRepository};

fn storage_err(e: DbErr) -> RequestError {
    RequestError::Storage(e.to_string())
}

/// PostgreSQL-backed request log.
///
/// Every terminal transition is a single conditional UPDATE, so the row
/// lock makes the compare-and-set atomic without an explicit transaction.
pub struct PgRequestLogRepository {
    db: DatabaseConnection,
}

impl PgRequestLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn conditional_update(
        &self,
        request_id: &str,
        set: entity::ActiveModel,
    ) -> RequestResult<u64> {
        let result = entity::Entity::update_many()
            .set(set)
            .filter(entity::Column::RequestId.eq(request_id))
            .filter(entity::Column::Status.eq(RequestStatus::Pending))
            .exec(&self.db)
            .await
            .map_err(storage_err)?;

        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RequestLogRepository for PgRequestLogRepository {
    async fn insert_pending(
        &self,
        input: &NewRequest,
        request_id: &str,
        actor: &str,
    ) -> RequestResult<RequestLog> {
        let active_model = entity::ActiveModel::pending(input, request_id, actor);

        let model =
            active_model
                .insert(&self.db)
                .await
                .map_err(|e| match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        RequestError::DuplicateRequestId(request_id.to_string())
                    }
                    _ => storage_err(e),
                })?;

        info!(request_id = %model.request_id, subject = %model.subject, "Registered pending request");
        Ok(model.into())
    }

    async fn mark_response(
        &self,
        request_id: &str,
        status: RequestStatus,
        payload: Option<String>,
        error_message: Option<String>,
        now: DateTime<Utc>,
        actor: &str,
    ) -> RequestResult<u64> {
        let updated = self
            .conditional_update(
                request_id,
                entity::ActiveModel {
                    status: Set(status),
                    response_payload: Set(payload),
                    error_message: Set(error_message),
                    response_timestamp: Set(Some(now.into())),
                    updated_by: Set(actor.to_string()),
                    updated_date: Set(now.into()),
                    ..Default::default()
                },
            )
            .await?;

        debug!(request_id, ?status, updated, "Conditional response transition");
        Ok(updated)
    }

    async fn mark_timeout(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
        actor: &str,
    ) -> RequestResult<u64> {
        let updated = self
            .conditional_update(
                request_id,
                entity::ActiveModel {
                    status: Set(RequestStatus::Timeout),
                    error_message: Set(Some("Request timed out awaiting response".to_string())),
                    updated_by: Set(actor.to_string()),
                    updated_date: Set(now.into()),
                    ..Default::default()
                },
            )
            .await?;

        debug!(request_id, updated, "Conditional timeout transition");
        Ok(updated)
    }

    async fn append_delayed(
        &self,
        request_id: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> RequestResult<u64> {
        self.conditional_update(
            request_id,
            entity::ActiveModel {
                response_payload: Set(Some(payload.to_string())),
                response_timestamp: Set(Some(now.into())),
                updated_date: Set(now.into()),
                ..Default::default()
            },
        )
        .await
    }

    async fn find_by_request_id(&self, request_id: &str) -> RequestResult<Option<RequestLog>> {
        let model = entity::Entity::find()
            .filter(entity::Column::RequestId.eq(request_id))
            .one(&self.db)
            .await
            .map_err(storage_err)?;

        Ok(model.map(Into::into))
    }

    async fn find_by_status(&self, status: RequestStatus) -> RequestResult<Vec<RequestLog>> {
        let models = entity::Entity::find()
            .filter(entity::Column::Status.eq(status))
            .order_by_asc(entity::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage_err)?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_timed_out(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u64,
    ) -> RequestResult<Vec<RequestLog>> {
        // Default-timeout rows use the sweeper threshold; rows with an
        // explicit timeout_duration are measured against their own budget.
        let overdue = Condition::any()
            .add(
                Condition::all()
                    .add(entity::Column::TimeoutDuration.is_null())
                    .add(entity::Column::RequestTimestamp.lte(threshold)),
            )
            .add(
                Condition::all()
                    .add(entity::Column::TimeoutDuration.is_not_null())
                    .add(Expr::cust_with_values(
                        "request_timestamp <= ? - (timeout_duration * interval '1 millisecond')",
                        [now],
                    )),
            );

        let models = entity::Entity::find()
            .filter(entity::Column::Status.eq(RequestStatus::Pending))
            .filter(overdue)
            .order_by_asc(entity::Column::RequestTimestamp)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(storage_err)?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_unmatched(
        &self,
        subject: &str,
        payload: &str,
        error: &str,
        tag: &str,
    ) -> RequestResult<RequestLog> {
        let now = Utc::now();
        let request_id = format!("UNMATCHED_{}", tag);

        let active_model = entity::ActiveModel {
            request_id: Set(request_id.clone()),
            subject: Set(subject.to_string()),
            request_payload: Set(String::new()),
            response_subject: Set(None),
            response_id_field: Set(None),
            status: Set(RequestStatus::Error),
            request_timestamp: Set(now.into()),
            response_timestamp: Set(Some(now.into())),
            response_payload: Set(Some(payload.to_string())),
            error_message: Set(Some(error.to_string())),
            retry_count: Set(0),
            timeout_duration: Set(None),
            created_by: Set("gateway".to_string()),
            updated_by: Set("gateway".to_string()),
            created_date: Set(now.into()),
            updated_date: Set(now.into()),
            ..Default::default()
        };

        let model = active_model.insert(&self.db).await.map_err(storage_err)?;

        info!(request_id = %request_id, subject, "Recorded unmatched response");
        Ok(model.into())
    }
}

/// PostgreSQL-backed recovery lock.
pub struct PgRecoveryLockRepository {
    db: DatabaseConnection,
}

impl PgRecoveryLockRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecoveryLockRepository for PgRecoveryLockRepository {
    async fn try_acquire(&self, pod_id: &str, ttl: Duration) -> RequestResult<bool> {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| RequestError::Validation(format!("lock ttl out of range: {}", e)))?;

        // Insert-or-steal in one statement; rows_affected = 1 means owned.
        // Only a live ACTIVE lease blocks acquisition: released
        // (COMPLETED) and lapsed leases are both up for grabs.
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            INSERT INTO listener_recovery_lock (lock_key, pod_id, acquired_at, expires_at, status)
            VALUES ($1, $2, $3, $4, 'ACTIVE')
            ON CONFLICT (lock_key) DO UPDATE
            SET pod_id = EXCLUDED.pod_id,
                acquired_at = EXCLUDED.acquired_at,
                expires_at = EXCLUDED.expires_at,
                status = 'ACTIVE'
            WHERE listener_recovery_lock.status <> 'ACTIVE'
               OR listener_recovery_lock.expires_at < EXCLUDED.acquired_at
            "#,
            [
                RECOVERY_LOCK_KEY.into(),
                pod_id.into(),
                now.into(),
                expires_at.into(),
            ],
        );

        let result = self.db.execute_raw(stmt).await.map_err(storage_err)?;
        let acquired = result.rows_affected() == 1;

        if acquired {
            info!(pod_id, "Acquired recovery lock");
        } else {
            debug!(pod_id, "Recovery lock held elsewhere");
        }

        Ok(acquired)
    }

    async fn complete(&self, pod_id: &str) -> RequestResult<()> {
        lock::Entity::update_many()
            .set(lock::ActiveModel {
                status: Set(LockStatus::Completed),
                ..Default::default()
            })
            .filter(lock::Column::LockKey.eq(RECOVERY_LOCK_KEY))
            .filter(lock::Column::PodId.eq(pod_id))
            .exec(&self.db)
            .await
            .map_err(storage_err)?;

        info!(pod_id, "Released recovery lock");
        Ok(())
    }

    async fn find(&self) -> RequestResult<Option<RecoveryLock>> {
        let model = lock::Entity::find_by_id(RECOVERY_LOCK_KEY)
            .one(&self.db)
            .await
            .map_err(storage_err)?;

        Ok(model.map(Into::into))
    }
}
