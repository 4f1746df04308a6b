//! REST surface for game sessions: listing joinable sessions, creating
//! new ones and looking a single one up by its key.

use crate::database::entities::game_sessions::CreateGameSession;
use crate::database::entities::{GameMode, GameSession};
use crate::middleware::auth::MaybeAuth;
use crate::utils::types::SessionKey;
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that could occur while working with session endpoints
#[derive(Debug, Error)]
pub enum SessionsError {
    #[error("Session not found")]
    NotFound,
    #[error("Unknown game mode")]
    UnknownMode,
    #[error("Internal server error")]
    Database(#[from] sea_orm::DbErr),
}

/// One session as listed to clients
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    session_id: SessionKey,
    name: String,
    mode: &'static str,
    is_private: bool,
    players_now: u32,
    players_max: u32,
    created_at: DateTime<Utc>,
    is_finished: bool,
}

impl From<GameSession> for SessionOverview {
    fn from(session: GameSession) -> Self {
        Self {
            session_id: session.session_key,
            name: session.name,
            mode: session.mode.label(),
            is_private: session.is_private,
            players_now: session.players_now,
            players_max: session.players_max,
            created_at: session.created_at,
            is_finished: session.is_finished,
        }
    }
}

/// GET /api/sessions
///
/// Lists every session that hasn't finished yet
pub async fn get_sessions(
    Extension(db): Extension<DatabaseConnection>,
) -> Result<Json<Vec<SessionOverview>>, SessionsError> {
    let sessions = GameSession::list_open(&db).await?;
    Ok(Json(sessions.into_iter().map(SessionOverview::from).collect()))
}

/// GET /api/sessions/:session_id
///
/// Details of a single session
pub async fn get_session(
    Path(session_id): Path<SessionKey>,
    Extension(db): Extension<DatabaseConnection>,
) -> Result<Json<SessionOverview>, SessionsError> {
    let session = GameSession::by_session_key(&db, session_id)
        .await?
        .ok_or(SessionsError::NotFound)?;
    Ok(Json(SessionOverview::from(session)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    name: String,
    /// Mode label, e.g. `single` or `tugofwar`
    mode: String,
    password: Option<String>,
    #[serde(default)]
    players_max: u32,
}

/// POST /api/sessions
///
/// Creates a new session. The creator is taken from the token when one
/// is provided; a password makes the session private.
pub async fn create_session(
    MaybeAuth(auth): MaybeAuth,
    Extension(db): Extension<DatabaseConnection>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionOverview>, SessionsError> {
    let mode = GameMode::from_label(&req.mode).ok_or(SessionsError::UnknownMode)?;
    let is_private = req.password.as_deref().is_some_and(|value| !value.is_empty());

    let session = GameSession::create(
        &db,
        CreateGameSession {
            mode,
            name: req.name,
            password: req.password,
            is_private,
            players_max: req.players_max,
            creator_id: auth.map(|player| player.id),
        },
    )
    .await?;

    Ok(Json(SessionOverview::from(session)))
}

impl IntoResponse for SessionsError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UnknownMode => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}
