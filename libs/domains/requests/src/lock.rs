//! Listener recovery lock entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The single row key; recovery is a process-wide singleton.
pub const RECOVERY_LOCK_KEY: &str = "listener-recovery";

/// Lease state of the recovery lock.
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
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "lock_status")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LockStatus {
    /// Held by a live owner
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Released after recovery finished
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Lease lapsed without release
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
}

/// Sea-ORM entity for the listener_recovery_lock table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listener_recovery_lock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub lock_key: String,
    pub pod_id: String,
    pub acquired_at: DateTimeWithTimeZone,
    pub expires_at: DateTimeWithTimeZone,
    pub status: LockStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Domain view of the lock row.
#[derive(Debug, Clone)]
pub struct RecoveryLock {
    pub lock_key: String,
    pub pod_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: LockStatus,
}

impl From<Model> for RecoveryLock {
    fn from(model: Model) -> Self {
        Self {
            lock_key: model.lock_key,
            pod_id: model.pod_id,
            acquired_at: model.acquired_at.into(),
            expires_at: model.expires_at.into(),
            status: model.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_status_display() {
        assert_eq!(LockStatus::Active.to_string(), "ACTIVE");
        assert_eq!(LockStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(LockStatus::Expired.to_string(), "EXPIRED");
    }
}
