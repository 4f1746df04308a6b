//! Event types exchanged between the connection glue and the game
//! controller. Inbound frames become [PlayerEvent]s, the controller
//! answers with [ServerEvent]s addressed either at the triggering
//! connection or at the whole session.

use crate::database::entities::Player;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types originating from a player connection. `Joined`, `Left`
/// and `Tick` are reserved: they are produced by the connection glue
/// itself and must never be accepted straight off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEventType {
    Joined,
    Left,
    Ready,
    Word,
    Vote,
    SwitchTeam,
    Tick,
}

impl ClientEventType {
    /// Maps a wire `type` field onto an event type
    pub fn from_wire(ty: &str) -> Option<ClientEventType> {
        Some(match ty {
            "player_joined" => ClientEventType::Joined,
            "player_left" => ClientEventType::Left,
            "ready_state" => ClientEventType::Ready,
            "word" => ClientEventType::Word,
            "vote" => ClientEventType::Vote,
            "switch_team" => ClientEventType::SwitchTeam,
            "tick" => ClientEventType::Tick,
            _ => return None,
        })
    }

    /// Whether the type may only be produced by the connection glue
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            ClientEventType::Joined | ClientEventType::Left | ClientEventType::Tick
        )
    }
}

/// Event types pushed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    InitialState,
    PlayersUpdate,
    GameBegins,
    StartGame,
    NewWord,
    GameOver,
    ModesAvailable,
    VotesUpdate,
    NewGame,
    NewHost,
    Error,
    /// Internal wake-up broadcast to host connections, never written to
    /// a client socket
    Tick,
}

/// Delivery scope of a server event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    /// Broadcast to every connection subscribed to the session
    All,
    /// Delivered only to the triggering connection
    Player,
}

/// An inbound event submitted to a game controller
pub struct PlayerEvent {
    pub ty: ClientEventType,
    pub player: Player,
    pub payload: Option<Value>,
}

impl PlayerEvent {
    pub fn joined(player: Player, password: Option<String>) -> PlayerEvent {
        PlayerEvent {
            ty: ClientEventType::Joined,
            player,
            payload: Some(serde_json::json!({ "password": password })),
        }
    }

    pub fn left(player: Player) -> PlayerEvent {
        PlayerEvent {
            ty: ClientEventType::Left,
            player,
            payload: None,
        }
    }

    pub fn tick(player: Player) -> PlayerEvent {
        PlayerEvent {
            ty: ClientEventType::Tick,
            player,
            payload: None,
        }
    }

    pub fn message(ty: ClientEventType, player: Player, payload: Option<Value>) -> PlayerEvent {
        PlayerEvent { ty, player, payload }
    }
}

/// An outbound event emitted by a game controller
#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub target: EventTarget,
    pub ty: EventType,
    pub data: Value,
}

/// Wire shape of both inbound and outbound frames
#[derive(Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ServerEvent {
    pub fn all(ty: EventType, data: Value) -> ServerEvent {
        ServerEvent {
            target: EventTarget::All,
            ty,
            data,
        }
    }

    pub fn to_sender(ty: EventType, data: Value) -> ServerEvent {
        ServerEvent {
            target: EventTarget::Player,
            ty,
            data,
        }
    }

    /// The wake-up signal broadcast to the hosts group by the ticker
    pub fn tick() -> ServerEvent {
        ServerEvent::to_sender(EventType::Tick, Value::Null)
    }

    /// Serializes the event into its `{type, data}` wire frame
    pub fn to_frame(&self) -> String {
        serde_json::json!({ "type": self.ty, "data": self.data }).to_string()
    }
}

/// Serializes a value that is known to be representable as JSON
pub fn json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("value not representable as JSON")
}
