use crate::models::{NewRequest, RequestStatus};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

/// Sea-ORM entity for the nats_request_log table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nats_request_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub request_id: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub request_payload: String,
    pub response_subject: Option<String>,
    pub response_id_field: Option<String>,
    pub status: RequestStatus,
    pub request_timestamp: DateTimeWithTimeZone,
    pub response_timestamp: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub response_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub timeout_duration: Option<i64>,
    pub created_by: String,
    pub updated_by: String,
    pub created_date: DateTimeWithTimeZone,
    pub updated_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Conversion from Sea-ORM Model to domain RequestLog
impl From<Model> for crate::models::RequestLog {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            request_id: model.request_id,
            subject: model.subject,
            request_payload: model.request_payload,
            response_subject: model.response_subject,
            response_id_field: model.response_id_field,
            status: model.status,
            request_timestamp: model.request_timestamp.into(),
            response_timestamp: model.response_timestamp.map(Into::into),
            response_payload: model.response_payload,
            error_message: model.error_message,
            retry_count: model.retry_count,
            timeout_duration: model.timeout_duration,
            created_by: model.created_by,
            updated_by: model.updated_by,
            created_date: model.created_date.into(),
            updated_date: model.updated_date.into(),
        }
    }
}

impl ActiveModel {
    /// Build a PENDING row for a new request. The caller is responsible
    /// for having resolved the request id beforehand.
    pub fn pending(input: &NewRequest, request_id: &str, actor: &str) -> Self {
        let now = Utc::now();
        ActiveModel {
            request_id: Set(request_id.to_string()),
            subject: Set(input.subject.clone()),
            request_payload: Set(input.payload.clone()),
            response_subject: Set(input.response_subject.clone()),
            response_id_field: Set(input.response_id_field.clone()),
            status: Set(RequestStatus::Pending),
            request_timestamp: Set(now.into()),
            response_timestamp: Set(None),
            response_payload: Set(None),
            error_message: Set(None),
            retry_count: Set(0),
            timeout_duration: Set(input.timeout.map(|t| t.as_millis() as i64)),
            created_by: Set(actor.to_string()),
            updated_by: Set(actor.to_string()),
            created_date: Set(now.into()),
            updated_date: Set(now.into()),
            ..Default::default()
        }
    }
}
