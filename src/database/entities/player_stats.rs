//! Rolling per-player statistics. Every player owns one overall row
//! (mode None) plus one row per game mode, updated from each persisted
//! session result.

use crate::database::entities::game_sessions::GameMode;
use crate::database::DbResult;
use crate::utils::types::PlayerId;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{Condition, IntoActiveModel};
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "player_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u32,
    pub player_id: PlayerId,
    /// Mode the row aggregates, None for the overall row
    pub mode: Option<GameMode>,
    pub avg_score: i64,
    pub best_score: i64,
    pub avg_speed: f64,
    pub best_speed: f64,
    pub games_played: u32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::players::Entity",
        from = "Column::PlayerId",
        to = "super::players::Column::Id"
    )]
    Player,
}

impl Related<super::players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Creates the empty stats rows for a freshly created player: the
    /// overall row plus one row per mode
    pub async fn create_for_player(db: &DatabaseConnection, player_id: PlayerId) -> DbResult<()> {
        let modes = std::iter::once(None).chain(GameMode::ALL.into_iter().map(Some));
        let rows = modes.map(|mode| ActiveModel {
            player_id: Set(player_id),
            mode: Set(mode),
            avg_score: Set(0),
            best_score: Set(0),
            avg_speed: Set(0.0),
            best_speed: Set(0.0),
            games_played: Set(0),
            ..Default::default()
        });
        Entity::insert_many(rows).exec(db).await?;
        Ok(())
    }

    /// Fetches the overall stats row for a player
    pub async fn overall(db: &DatabaseConnection, player_id: PlayerId) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(Column::PlayerId.eq(player_id))
            .filter(Column::Mode.is_null())
            .one(db)
            .await
    }

    /// Fetches every stats row for a player
    pub async fn for_player(db: &DatabaseConnection, player_id: PlayerId) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::PlayerId.eq(player_id))
            .all(db)
            .await
    }

    /// Folds a freshly persisted result into the player's overall row
    /// and the row for the session's mode
    pub async fn update_from_result(
        db: &DatabaseConnection,
        player_id: PlayerId,
        mode: GameMode,
        score: i64,
        speed: f64,
    ) -> DbResult<()> {
        let rows = Entity::find()
            .filter(Column::PlayerId.eq(player_id))
            .filter(
                Condition::any()
                    .add(Column::Mode.is_null())
                    .add(Column::Mode.eq(mode)),
            )
            .all(db)
            .await?;

        for row in rows {
            let games = row.games_played;
            let mut model = row.clone().into_active_model();
            model.best_score = Set(row.best_score.max(score));
            model.avg_score = Set(new_average(row.avg_score as f64, score as f64, games).round()
                as i64);
            model.best_speed = Set(row.best_speed.max(speed));
            model.avg_speed = Set(new_average(row.avg_speed, speed, games));
            model.games_played = Set(games + 1);
            model.update(db).await?;
        }

        Ok(())
    }
}

/// Running average over `n` previous games extended with one new value
fn new_average(old_avg: f64, value: f64, n: u32) -> f64 {
    (old_avg * n as f64 + value) / (n as f64 + 1.0)
}
