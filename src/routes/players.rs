//! Read-only player endpoints: profiles with their per-mode stats.

use crate::database::entities::{Player, PlayerStats};
use crate::middleware::auth::Auth;
use crate::utils::types::PlayerId;
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use thiserror::Error;

/// Errors that could occur while working with player endpoints
#[derive(Debug, Error)]
pub enum PlayersError {
    #[error("Player not found")]
    NotFound,
    #[error("Internal server error")]
    Database(#[from] sea_orm::DbErr),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsEntry {
    /// Mode label the row aggregates, null for the overall row
    mode: Option<&'static str>,
    avg_score: i64,
    best_score: i64,
    avg_speed: f64,
    best_speed: f64,
    games_played: u32,
}

impl From<PlayerStats> for StatsEntry {
    fn from(stats: PlayerStats) -> Self {
        Self {
            mode: stats.mode.map(|mode| mode.label()),
            avg_score: stats.avg_score,
            best_score: stats.best_score,
            avg_speed: stats.avg_speed,
            best_speed: stats.best_speed,
            games_played: stats.games_played,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    id: PlayerId,
    displayed_name: String,
    stats: Vec<StatsEntry>,
}

async fn profile(db: &DatabaseConnection, player: Player) -> Result<PlayerProfile, PlayersError> {
    let stats = PlayerStats::for_player(db, player.id).await?;
    Ok(PlayerProfile {
        id: player.id,
        displayed_name: player.display_name,
        stats: stats.into_iter().map(StatsEntry::from).collect(),
    })
}

/// GET /api/players/self
///
/// Profile of the authenticated player
pub async fn get_self(
    Auth(player): Auth,
    Extension(db): Extension<DatabaseConnection>,
) -> Result<Json<PlayerProfile>, PlayersError> {
    Ok(Json(profile(&db, player).await?))
}

/// GET /api/players/:id
///
/// Profile of a player by id
pub async fn get_player(
    Path(player_id): Path<PlayerId>,
    Extension(db): Extension<DatabaseConnection>,
) -> Result<Json<PlayerProfile>, PlayersError> {
    let player = Player::by_id(&db, player_id)
        .await?
        .ok_or(PlayersError::NotFound)?;
    Ok(Json(profile(&db, player).await?))
}

impl IntoResponse for PlayersError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}
