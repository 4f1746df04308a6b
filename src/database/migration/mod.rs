pub use sea_orm_migration::prelude::*;

mod m20250512_093000_players_table;
mod m20250512_093100_game_sessions_table;
mod m20250512_093200_session_results_table;
mod m20250512_093300_player_stats_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250512_093000_players_table::Migration),
            Box::new(m20250512_093100_game_sessions_table::Migration),
            Box::new(m20250512_093200_session_results_table::Migration),
            Box::new(m20250512_093300_player_stats_table::Migration),
        ]
    }
}
