use sea_orm_migration::prelude::*;

use crate::m20250101_000001_create_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Accounts created without an email share the empty string, so only
// non-empty addresses are unique.
const CREATE_UNIQUE_EMAIL: &str =
    "CREATE UNIQUE INDEX idx_users_email_unique ON users (email) WHERE email <> ''";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_users_email")
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(CREATE_UNIQUE_EMAIL)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_users_email_unique")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .to_owned(),
            )
            .await
    }
}
