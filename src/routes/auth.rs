//! Account routes: registration and login, both answering with a
//! bearer token for the WebSocket and REST surfaces.

use crate::database::entities::Player;
use crate::services::tokens::Tokens;
use crate::utils::hashing::{hash_password, verify_password};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Server error occurred")]
    ServerError,
    #[error("The provided credentials are invalid")]
    InvalidCredentials,
    #[error("The provided username is invalid")]
    InvalidUsername,
    #[error("The provided username is in use")]
    UsernameTaken,
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    username: String,
    /// The plain-text password
    password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    token: String,
}

/// POST /api/auth/login
///
/// Verifies the provided credentials and answers with a fresh token
pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Extension(tokens): Extension<Arc<Tokens>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let player = Player::by_username(&db, &req.username)
        .await
        .map_err(|_| AuthError::ServerError)?
        .ok_or(AuthError::InvalidCredentials)?;

    let password = player
        .password
        .as_ref()
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&req.password, password) {
        return Err(AuthError::InvalidCredentials);
    }

    let token = tokens.claim(player.id);
    Ok(Json(TokenResponse { token }))
}

/// POST /api/auth/create
///
/// Creates a registered account and answers with a fresh token
pub async fn create(
    Extension(db): Extension<DatabaseConnection>,
    Extension(tokens): Extension<Arc<Tokens>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    if req.username.is_empty() {
        return Err(AuthError::InvalidUsername);
    }

    match Player::by_username(&db, &req.username).await {
        Ok(Some(_)) => return Err(AuthError::UsernameTaken),
        Ok(None) => {}
        Err(_) => return Err(AuthError::ServerError),
    }

    let password = hash_password(&req.password).map_err(|_| AuthError::ServerError)?;

    let player = Player::create_registered(&db, req.username, password)
        .await
        .map_err(|_| AuthError::ServerError)?;

    let token = tokens.claim(player.id);
    Ok(Json(TokenResponse { token }))
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            AuthError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UsernameTaken | AuthError::InvalidUsername => StatusCode::BAD_REQUEST,
        };

        (status_code, self.to_string()).into_response()
    }
}
