use sea_orm_migration::{prelude::*, schema::*};
use sea_orm_migration::sea_orm::sea_query::extension::postgres::Type;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create request_status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(RequestStatus::Enum)
                    .values([
                        RequestStatus::Pending,
                        RequestStatus::Success,
                        RequestStatus::Failed,
                        RequestStatus::Timeout,
                        RequestStatus::Error,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NatsRequestLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NatsRequestLog::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::RequestId)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::Subject)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(text(NatsRequestLog::RequestPayload))
                    .col(
                        ColumnDef::new(NatsRequestLog::ResponseSubject)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::ResponseIdField)
                            .string_len(128)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::Status)
                            .enumeration(
                                RequestStatus::Enum,
                                [
                                    RequestStatus::Pending,
                                    RequestStatus::Success,
                                    RequestStatus::Failed,
                                    RequestStatus::Timeout,
                                    RequestStatus::Error,
                                ],
                            )
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::RequestTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone_null(
                        NatsRequestLog::ResponseTimestamp,
                    ))
                    .col(text_null(NatsRequestLog::ResponsePayload))
                    .col(text_null(NatsRequestLog::ErrorMessage))
                    .col(
                        ColumnDef::new(NatsRequestLog::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::TimeoutDuration)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::CreatedBy)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NatsRequestLog::UpdatedBy)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(NatsRequestLog::CreatedDate)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(NatsRequestLog::UpdatedDate)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // REQUEST_ID lookups drive correlation; STATUS and REQUEST_TIMESTAMP
        // drive the sweeper scan.
        manager
            .create_index(
                Index::create()
                    .name("idx_nats_request_log_request_id")
                    .table(NatsRequestLog::Table)
                    .col(NatsRequestLog::RequestId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_nats_request_log_status")
                    .table(NatsRequestLog::Table)
                    .col(NatsRequestLog::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_nats_request_log_request_timestamp")
                    .table(NatsRequestLog::Table)
                    .col(NatsRequestLog::RequestTimestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NatsRequestLog::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(RequestStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum RequestStatus {
    #[sea_orm(iden = "request_status")]
    Enum,
    #[sea_orm(iden = "PENDING")]
    Pending,
    #[sea_orm(iden = "SUCCESS")]
    Success,
    #[sea_orm(iden = "FAILED")]
    Failed,
    #[sea_orm(iden = "TIMEOUT")]
    Timeout,
    #[sea_orm(iden = "ERROR")]
    Error,
}

#[derive(DeriveIden)]
enum NatsRequestLog {
    Table,
    Id,
    RequestId,
    Subject,
    RequestPayload,
    ResponseSubject,
    ResponseIdField,
    Status,
    RequestTimestamp,
    ResponseTimestamp,
    ResponsePayload,
    ErrorMessage,
    RetryCount,
    TimeoutDuration,
    CreatedBy,
    UpdatedBy,
    CreatedDate,
    UpdatedDate,
}
