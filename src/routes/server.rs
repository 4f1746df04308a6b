//! Server details endpoint used by clients and health checks.

use crate::config::VERSION;
use axum::Json;
use serde::Serialize;

/// Response detailing the server
#[derive(Serialize)]
pub struct ServerDetails {
    /// Identifier for the server type
    ident: &'static str,
    /// The server version
    version: &'static str,
}

/// GET /api/server
pub async fn server_details() -> Json<ServerDetails> {
    Json(ServerDetails {
        ident: "TYPEARENA_SERVER",
        version: VERSION,
    })
}
