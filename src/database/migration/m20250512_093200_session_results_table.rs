use sea_orm_migration::prelude::*;

use super::m20250512_093000_players_table::Players;
use super::m20250512_093100_game_sessions_table::GameSessions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SessionResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionResults::Id)
                            .unsigned()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SessionResults::SessionId)
                            .unsigned()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SessionResults::PlayerId).unsigned().null())
                    .col(ColumnDef::new(SessionResults::Team).string().null())
                    .col(
                        ColumnDef::new(SessionResults::Score)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SessionResults::Speed).double().not_null())
                    .col(
                        ColumnDef::new(SessionResults::MistakeRatio)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionResults::IsWinner)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionResults::CorrectWords)
                            .unsigned()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SessionResults::IncorrectWords)
                            .unsigned()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SessionResults::Table, SessionResults::SessionId)
                            .to(GameSessions::Table, GameSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SessionResults::Table, SessionResults::PlayerId)
                            .to(Players::Table, Players::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-session-player-result")
                    .table(SessionResults::Table)
                    .col(SessionResults::SessionId)
                    .col(SessionResults::PlayerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(SessionResults::Table)
                    .name("idx-session-player-result")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SessionResults::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SessionResults {
    Table,
    Id,
    SessionId,
    PlayerId,
    Team,
    Score,
    Speed,
    MistakeRatio,
    IsWinner,
    CorrectWords,
    IncorrectWords,
}
