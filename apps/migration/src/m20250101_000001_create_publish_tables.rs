//! Posts, their per-destination targets, and the destination directory.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Posts::Content).text().not_null())
                    .col(
                        ColumnDef::new(Posts::MediaUrls)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Posts::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Posts::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::PublishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Posts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Overdue scan: scheduled posts ordered by due time.
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_status_scheduled_at")
                    .table(Posts::Table)
                    .col(Posts::Status)
                    .col(Posts::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Targets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Targets::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Targets::PostId).uuid().not_null())
                    .col(ColumnDef::new(Targets::DestinationId).uuid().not_null())
                    .col(ColumnDef::new(Targets::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Targets::RemoteId).string())
                    .col(ColumnDef::new(Targets::ErrorKind).string_len(32))
                    .col(ColumnDef::new(Targets::ErrorMessage).text())
                    .col(
                        ColumnDef::new(Targets::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Targets::LastAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Targets::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Targets::LeaseToken).uuid())
                    .col(ColumnDef::new(Targets::LeaseExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Targets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Targets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_targets_post_id")
                            .from(Targets::Table, Targets::PostId)
                            .to(Posts::Table, Posts::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one target per (post, destination).
        manager
            .create_index(
                Index::create()
                    .name("uq_targets_post_destination")
                    .table(Targets::Table)
                    .col(Targets::PostId)
                    .col(Targets::DestinationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Destinations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Destinations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Destinations::Platform).string_len(32).not_null())
                    .col(ColumnDef::new(Destinations::ExternalId).string().not_null())
                    .col(ColumnDef::new(Destinations::Name).string().not_null())
                    .col(ColumnDef::new(Destinations::AccessToken).text().not_null())
                    .col(ColumnDef::new(Destinations::TokenExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Destinations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Destinations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Targets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Destinations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    Content,
    MediaUrls,
    Status,
    ScheduledAt,
    PublishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Targets {
    Table,
    Id,
    PostId,
    DestinationId,
    Status,
    RemoteId,
    ErrorKind,
    ErrorMessage,
    AttemptCount,
    LastAttemptAt,
    PublishedAt,
    LeaseToken,
    LeaseExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Destinations {
    Table,
    Id,
    Platform,
    ExternalId,
    Name,
    AccessToken,
    TokenExpiresAt,
    CreatedAt,
    UpdatedAt,
}
