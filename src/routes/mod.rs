use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::cors::cors_layer;

mod auth;
mod play;
mod players;
mod server;
mod sessions;

/// Function for configuring the provided service config with all the
/// application routes.
pub fn router() -> Router {
    Router::new()
        // Session play socket (with and without the path token variant)
        .route("/ws/play/:session_id", get(play::play))
        .route("/ws/play/:session_id/", get(play::play))
        .route("/ws/play/:session_id/:token", get(play::play_with_token))
        .route("/ws/play/:session_id/:token/", get(play::play_with_token))
        // REST API
        .nest(
            "/api",
            Router::new()
                // Session routing
                .nest(
                    "/sessions",
                    Router::new()
                        .route("/", get(sessions::get_sessions).post(sessions::create_session))
                        .route("/:id", get(sessions::get_session)),
                )
                // Player routing
                .nest(
                    "/players",
                    Router::new()
                        .route("/self", get(players::get_self))
                        .route("/:id", get(players::get_player)),
                )
                // Authentication routes
                .nest(
                    "/auth",
                    Router::new()
                        .route("/login", post(auth::login))
                        .route("/create", post(auth::create)),
                )
                // Server details routes
                .route("/server", get(server::server_details))
                .layer(middleware::from_fn(cors_layer)),
        )
}
