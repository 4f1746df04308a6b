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
                    .table(PlayerStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlayerStats::Id)
                            .unsigned()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlayerStats::PlayerId).unsigned().not_null())
                    .col(ColumnDef::new(PlayerStats::Mode).string_len(1).null())
                    .col(
                        ColumnDef::new(PlayerStats::AvgScore)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlayerStats::BestScore)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlayerStats::AvgSpeed)
                            .double()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlayerStats::BestSpeed)
                            .double()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlayerStats::GamesPlayed)
                            .unsigned()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PlayerStats::Table, PlayerStats::PlayerId)
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
                    .name("idx-player-mode-stats")
                    .table(PlayerStats::Table)
                    .col(PlayerStats::PlayerId)
                    .col(PlayerStats::Mode)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(PlayerStats::Table)
                    .name("idx-player-mode-stats")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(PlayerStats::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PlayerStats {
    Table,
    Id,
    PlayerId,
    Mode,
    AvgScore,
    BestScore,
    AvgSpeed,
    BestSpeed,
    GamesPlayed,
}
