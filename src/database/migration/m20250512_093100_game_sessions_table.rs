use sea_orm_migration::prelude::*;

use super::m20250512_093000_players_table::Players;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GameSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GameSessions::Id)
                            .unsigned()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::Mode)
                            .string_len(1)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GameSessions::Name).string().not_null())
                    .col(ColumnDef::new(GameSessions::Password).string().null())
                    .col(
                        ColumnDef::new(GameSessions::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GameSessions::PlayersMax)
                            .unsigned()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GameSessions::PlayersNow)
                            .unsigned()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(GameSessions::CreatorId).unsigned().null())
                    .col(
                        ColumnDef::new(GameSessions::SessionKey)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::IsFinished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GameSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(GameSessions::Table, GameSessions::CreatorId)
                            .to(Players::Table, Players::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GameSessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum GameSessions {
    Table,
    Id,
    Mode,
    Name,
    Password,
    IsPrivate,
    PlayersMax,
    PlayersNow,
    CreatorId,
    SessionKey,
    IsFinished,
    CreatedAt,
    StartedAt,
    FinishedAt,
}
