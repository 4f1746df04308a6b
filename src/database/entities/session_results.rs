//! Per-player result rows persisted when a session finishes.

use crate::database::entities::game_sessions;
use crate::database::DbResult;
use crate::utils::types::{PlayerId, SessionId};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::Serialize;
use thiserror::Error;

#[derive(Serialize, Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "session_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u32,
    /// Session the result belongs to
    pub session_id: SessionId,
    /// Player the result belongs to
    pub player_id: Option<PlayerId>,
    /// Team the player finished on when the session had teams
    pub team: Option<String>,
    pub score: i64,
    pub speed: f64,
    pub mistake_ratio: f64,
    pub is_winner: bool,
    pub correct_words: u32,
    pub incorrect_words: u32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::game_sessions::Entity",
        from = "Column::SessionId",
        to = "super::game_sessions::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::players::Entity",
        from = "Column::PlayerId",
        to = "super::players::Column::Id"
    )]
    Player,
}

impl Related<super::game_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Errors that can occur while persisting session results
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Results were handed in before the session was marked finished
    #[error("results cannot be saved before the session is finished")]
    SessionNotFinished,
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// A single result row before it has been inserted
pub struct NewSessionResult {
    pub player_id: Option<PlayerId>,
    pub team: Option<String>,
    pub score: i64,
    pub speed: f64,
    pub mistake_ratio: f64,
    pub is_winner: bool,
    pub correct_words: u32,
    pub incorrect_words: u32,
}

impl Model {
    /// Persists a batch of result rows for the provided session and folds
    /// each row into the owning player's rolling stats. Refuses to persist
    /// anything for a session that hasn't been marked finished.
    pub async fn save_batch(
        db: &DatabaseConnection,
        session: &game_sessions::Model,
        results: Vec<NewSessionResult>,
    ) -> Result<(), ResultsError> {
        if !session.is_finished {
            return Err(ResultsError::SessionNotFinished);
        }

        for result in results {
            ActiveModel {
                session_id: Set(session.id),
                player_id: Set(result.player_id),
                team: Set(result.team),
                score: Set(result.score),
                speed: Set(result.speed),
                mistake_ratio: Set(result.mistake_ratio),
                is_winner: Set(result.is_winner),
                correct_words: Set(result.correct_words),
                incorrect_words: Set(result.incorrect_words),
                ..Default::default()
            }
            .insert(db)
            .await?;

            if let Some(player_id) = result.player_id {
                super::player_stats::Model::update_from_result(
                    db,
                    player_id,
                    session.mode,
                    result.score,
                    result.speed,
                )
                .await?;
            }
        }

        Ok(())
    }

    /// Fetches all results stored for a session
    pub async fn for_session(db: &DatabaseConnection, session_id: SessionId) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .all(db)
            .await
    }
}

#[cfg(test)]
mod test {
    use super::{Model, NewSessionResult, ResultsError};
    use crate::database::connect_test;
    use crate::database::entities::game_sessions::{
        CreateGameSession, GameMode, Model as GameSession,
    };
    use crate::database::entities::players::Model as Player;

    fn result_row(player_id: Option<u32>) -> NewSessionResult {
        NewSessionResult {
            player_id,
            team: None,
            score: 42,
            speed: 3.5,
            mistake_ratio: 0.25,
            is_winner: true,
            correct_words: 6,
            incorrect_words: 2,
        }
    }

    async fn create_session(db: &sea_orm::DatabaseConnection) -> GameSession {
        GameSession::create(
            db,
            CreateGameSession {
                mode: GameMode::Single,
                name: "results test".to_string(),
                password: None,
                is_private: false,
                players_max: 0,
                creator_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_refused_before_finish() {
        let db = connect_test().await;
        let session = create_session(&db).await;

        let err = Model::save_batch(&db, &session, vec![result_row(None)])
            .await
            .unwrap_err();
        assert!(matches!(err, ResultsError::SessionNotFinished));
        assert!(Model::for_session(&db, session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_persisted_and_stats_updated() {
        let db = connect_test().await;
        let session = create_session(&db).await;
        let player = Player::create_anonymous(&db, "ada".to_string())
            .await
            .unwrap();

        let session = session.finish(&db).await.unwrap();
        Model::save_batch(&db, &session, vec![result_row(Some(player.id))])
            .await
            .unwrap();

        let rows = Model::for_session(&db, session.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 42);
        assert!(rows[0].is_winner);

        let stats = crate::database::entities::player_stats::Model::overall(&db, player.id)
            .await
            .unwrap()
            .expect("missing overall stats row");
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.best_score, 42);
    }
}
