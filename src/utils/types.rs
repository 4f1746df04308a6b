//! Module for type aliases that help to better identify field types

use uuid::Uuid;

/// Durable identifier of a player row
pub type PlayerId = u32;
/// Durable identifier of a game session row
pub type SessionId = u32;
/// Public UUID a session is addressed by on the wire
pub type SessionKey = Uuid;
/// Identifier for a single WebSocket connection
pub type ConnectionId = u32;
