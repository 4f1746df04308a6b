//! Error taxonomy of the game controller and its surroundings.

use crate::database::entities::session_results::ResultsError;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// A join was refused (session full, wrong state, wrong password,
    /// duplicate player)
    #[error("{0}")]
    JoinRefused(String),
    /// Controller construction was attempted for a session that already
    /// started or finished
    #[error("this session can no longer be joined")]
    GameOver,
    /// No session exists for the provided identifier
    #[error("session not found")]
    NotFound,
    /// The incoming event type is not part of the protocol
    #[error("unknown event type")]
    EventTypeNotDefined,
    /// The event payload failed validation
    #[error("{0}")]
    InvalidMessage(String),
    /// The operation is not permitted in the current state or with the
    /// session's options
    #[error("{0}")]
    InvalidOperation(String),
    /// A vote was cast for a label that is not a known mode
    #[error("cannot select mode `{0}`")]
    InvalidModeChoice(String),
    /// Internal signal: the handler chose to drop the event silently.
    /// Never escapes `player_event`.
    #[error("event discarded")]
    Discarded,
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl ControllerError {
    /// The reason string put into `error` events. Storage failures are
    /// masked with a generic message.
    pub fn client_message(&self) -> String {
        match self {
            ControllerError::Results(_) | ControllerError::Database(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
