use sea_orm_migration::{prelude::*, schema::*};
use sea_orm_migration::sea_orm::sea_query::extension::postgres::Type;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create lock_status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(LockStatus::Enum)
                    .values([
                        LockStatus::Active,
                        LockStatus::Completed,
                        LockStatus::Expired,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ListenerRecoveryLock::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ListenerRecoveryLock::LockKey)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ListenerRecoveryLock::PodId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ListenerRecoveryLock::AcquiredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ListenerRecoveryLock::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ListenerRecoveryLock::Status)
                            .enumeration(
                                LockStatus::Enum,
                                [
                                    LockStatus::Active,
                                    LockStatus::Completed,
                                    LockStatus::Expired,
                                ],
                            )
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ListenerRecoveryLock::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(LockStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum LockStatus {
    #[sea_orm(iden = "lock_status")]
    Enum,
    #[sea_orm(iden = "ACTIVE")]
    Active,
    #[sea_orm(iden = "COMPLETED")]
    Completed,
    #[sea_orm(iden = "EXPIRED")]
    Expired,
}

#[derive(DeriveIden)]
enum ListenerRecoveryLock {
    Table,
    LockKey,
    PodId,
    AcquiredAt,
    ExpiresAt,
    Status,
}
