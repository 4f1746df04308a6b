//! Authentication extractors for the REST surface. Tokens issued by the
//! auth routes travel in the `X-Token` header.

use crate::database::entities::Player;
use crate::services::tokens::{Tokens, VerifyError};
use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;
use thiserror::Error;

/// The HTTP header that contains the authentication token
const TOKEN_HEADER: &str = "X-Token";

/// Extractor requiring a valid token
pub struct Auth(pub Player);

/// Extractor tolerating the absence of a token
pub struct MaybeAuth(pub Option<Player>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuth
where
    S: Send + Sync,
{
    type Rejection = TokenError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(value)) => Ok(MaybeAuth(Some(value))),
            Err(TokenError::MissingToken) => Ok(MaybeAuth(None)),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = TokenError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let db = parts
            .extensions
            .get::<DatabaseConnection>()
            .expect("Database connection extension missing")
            .clone();
        let tokens = parts
            .extensions
            .get::<Arc<Tokens>>()
            .expect("Tokens extension missing")
            .clone();

        // Extract the token from the headers and verify it as a player id
        let player_id = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(TokenError::MissingToken)
            .and_then(|token| {
                tokens.verify(token).map_err(|err| match err {
                    VerifyError::Expired => TokenError::ExpiredToken,
                    VerifyError::Invalid => TokenError::InvalidToken,
                })
            })?;

        let player = Player::by_id(&db, player_id)
            .await?
            .ok_or(TokenError::InvalidToken)?;

        Ok(Self(player))
    }
}

/// Error type used by the token checking extractors to create error
/// responses based on the failure
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token was expired
    #[error("Expired token")]
    ExpiredToken,
    /// The token header was not provided on the request
    #[error("Missing token")]
    MissingToken,
    /// The provided token was not a valid token
    #[error("Invalid token")]
    InvalidToken,
    /// Database error
    #[error("Internal server error")]
    Database(#[from] DbErr),
}

impl IntoResponse for TokenError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingToken => StatusCode::BAD_REQUEST,
            Self::InvalidToken | Self::ExpiredToken => StatusCode::UNAUTHORIZED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Body::from(self.to_string())).into_response()
    }
}
