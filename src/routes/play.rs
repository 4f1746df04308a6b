//! WebSocket entry points for playing a session. The canonical URL is
//! `/ws/play/:session_id/?username=..&jwt=..&password=..`; the variant
//! appending the token as an extra path segment is kept accepted for
//! older clients.

use crate::services::game::registry::ControllerRegistry;
use crate::services::groups::Groups;
use crate::services::tokens::Tokens;
use crate::socket::{handle_socket, PlayQuery};
use crate::utils::types::SessionKey;
use axum::{
    extract::{Path, Query, WebSocketUpgrade},
    response::Response,
    Extension,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// GET /ws/play/:session_id
///
/// Upgrades the connection and hands it to the socket module
pub async fn play(
    Path(session_id): Path<SessionKey>,
    Query(query): Query<PlayQuery>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<ControllerRegistry>>,
    Extension(groups): Extension<Arc<Groups>>,
    Extension(tokens): Extension<Arc<Tokens>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_socket(socket, session_id, query, None, db, registry, groups, tokens)
    })
}

/// GET /ws/play/:session_id/:token
///
/// Same as [play] with the credential token embedded in the path
pub async fn play_with_token(
    Path((session_id, token)): Path<(SessionKey, String)>,
    Query(query): Query<PlayQuery>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<ControllerRegistry>>,
    Extension(groups): Extension<Arc<Groups>>,
    Extension(tokens): Extension<Arc<Tokens>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_socket(
            socket,
            session_id,
            query,
            Some(token),
            db,
            registry,
            groups,
            tokens,
        )
    })
}
