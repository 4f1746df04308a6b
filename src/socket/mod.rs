//! Per-client WebSocket endpoints. A connection authenticates the
//! caller, joins the session through the controller registry, translates
//! inbound frames into controller events and fans the controller's
//! outbound events back out: events for the sender go straight onto the
//! socket, broadcasts go through the session's pub/sub group. The first
//! connection of a session nominates itself as host and relays the
//! ticker's wake-ups into the controller.

use crate::database::entities::Player;
use crate::services::game::error::ControllerError;
use crate::services::game::event::{
    json, ClientEventType, EventTarget, EventType, InboundFrame, PlayerEvent, ServerEvent,
};
use crate::services::game::registry::{ControllerRef, ControllerRegistry};
use crate::services::groups::{Groups, HOSTS_GROUP};
use crate::services::tokens::Tokens;
use crate::utils::types::{ConnectionId, SessionKey};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Application close code sent when a connection is refused
const CLOSE_JOIN_REFUSED: u16 = 4418;

/// Error reason for frames without a usable type field
const INVALID_TYPE_REASON: &str = "message type is invalid or not present";

static NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(1);

/// Query parameters accepted by the play endpoint
#[derive(Deserialize, Default)]
pub struct PlayQuery {
    /// Displayed name for anonymous participants
    pub username: Option<String>,
    /// Bearer token; valid tokens override the username
    pub jwt: Option<String>,
    /// Password for private sessions
    pub password: Option<String>,
}

/// Everything a live connection needs to route events
struct Connection {
    id: ConnectionId,
    session_key: SessionKey,
    /// Group name the session broadcasts through
    session_group: String,
    player: Player,
    controller: ControllerRef,
    registry: Arc<ControllerRegistry>,
    groups: Arc<Groups>,
    sink: SplitSink<WebSocket, Message>,
    /// Sender half handed to the groups service on subscribe
    tx: UnboundedSender<Arc<ServerEvent>>,
    is_host: bool,
}

/// Drives one upgraded WebSocket until the client goes away
pub async fn handle_socket(
    socket: WebSocket,
    session_key: SessionKey,
    query: PlayQuery,
    path_token: Option<String>,
    db: DatabaseConnection,
    registry: Arc<ControllerRegistry>,
    groups: Arc<Groups>,
    tokens: Arc<Tokens>,
) {
    let (mut sink, mut stream) = socket.split();

    // Resolve who is connecting before touching the session
    let player = match resolve_player(&db, &tokens, &query, path_token).await {
        Ok(Some(player)) => player,
        Ok(None) => {
            refuse(&mut sink, "either `username` or `jwt` are required to join").await;
            return;
        }
        Err(err) => {
            error!("Failed to resolve connecting player: {err}");
            refuse(&mut sink, "internal server error").await;
            return;
        }
    };

    let controller = match registry.acquire(session_key).await {
        Ok(controller) => controller,
        Err(err) => {
            refuse(&mut sink, &err.client_message()).await;
            return;
        }
    };

    // Subscribe before the join events go out so this connection also
    // receives the join broadcast through the session group
    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::AcqRel);
    let session_group = session_key.to_string();
    let (tx, mut rx) = unbounded_channel();
    groups.subscribe(&session_group, id, tx.clone());

    // Join and host nomination happen under one controller lock so two
    // racing first connections cannot both become host
    let join = {
        let mut controller = controller.lock().await;
        match controller
            .player_event(PlayerEvent::joined(player.clone(), query.password.clone()))
            .await
        {
            Ok(events) => {
                let mut is_host = false;
                if controller.host_id().is_none() && controller.set_host(&player).is_ok() {
                    groups.subscribe(HOSTS_GROUP, id, tx.clone());
                    is_host = true;
                    debug!("Connection {id} hosts session {session_key}");
                }
                Ok((events, is_host))
            }
            Err(err) => Err(err),
        }
    };

    let (events, is_host) = match join {
        Ok(value) => value,
        Err(err) => {
            groups.unsubscribe(&session_group, id);
            registry.release(session_key).await;
            refuse(&mut sink, &err.client_message()).await;
            return;
        }
    };

    let mut connection = Connection {
        id,
        session_key,
        session_group,
        player,
        controller,
        registry,
        groups,
        sink,
        tx,
        is_host,
    };

    connection.dispatch(events).await;
    connection.run(&mut stream, &mut rx).await;
    connection.shutdown().await;
}

impl Connection {
    /// Select loop over inbound frames and group deliveries. Returns
    /// when the client goes away.
    async fn run(
        &mut self,
        stream: &mut SplitStream<WebSocket>,
        rx: &mut UnboundedReceiver<Arc<ServerEvent>>,
    ) {
        loop {
            tokio::select! {
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_frame(&text).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        // Ping/pong is handled by the library, binary
                        // frames are not part of the protocol
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    }
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if !self.handle_group_event(event).await {
                        break;
                    }
                }
            }
        }
    }

    /// Translates one inbound text frame into a controller event.
    /// Returns false once the socket is no longer writable.
    async fn handle_frame(&mut self, text: &str) -> bool {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(_) => return self.send_error(INVALID_TYPE_REASON).await,
        };

        let ty = match classify(frame.ty.as_deref()) {
            FrameType::Accepted(ty) => ty,
            FrameType::Reserved | FrameType::Missing => {
                return self.send_error(INVALID_TYPE_REASON).await
            }
            FrameType::Unknown => {
                return self
                    .send_error(&ControllerError::EventTypeNotDefined.client_message())
                    .await
            }
        };

        let result = {
            let mut controller = self.controller.lock().await;
            controller
                .player_event(PlayerEvent::message(ty, self.player.clone(), frame.data))
                .await
        };

        match result {
            Ok(events) => self.dispatch(events).await,
            Err(err) => self.send_error(&err.client_message()).await,
        }
    }

    /// Handles one event delivered through a subscribed group
    async fn handle_group_event(&mut self, event: Arc<ServerEvent>) -> bool {
        // Ticks are wake-up signals for the host, not client traffic
        if event.ty == EventType::Tick {
            if !self.is_host {
                return true;
            }
            let result = {
                let mut controller = self.controller.lock().await;
                controller
                    .player_event(PlayerEvent::tick(self.player.clone()))
                    .await
            };
            return match result {
                Ok(events) => self.dispatch(events).await,
                Err(err) => {
                    error!("Tick failed (session: {}): {err}", self.session_key);
                    true
                }
            };
        }

        // Becoming host is announced through the session group
        if event.ty == EventType::NewHost && !self.is_host && event.data == json(&self.player.id) {
            self.is_host = true;
            self.groups.subscribe(HOSTS_GROUP, self.id, self.tx.clone());
            debug!("Connection {} hosts session {}", self.id, self.session_key);
        }

        self.sink
            .send(Message::Text(event.to_frame()))
            .await
            .is_ok()
    }

    /// Routes controller events to their targets. Returns false once
    /// the socket is no longer writable.
    async fn dispatch(&mut self, events: Vec<ServerEvent>) -> bool {
        for event in events {
            match event.target {
                EventTarget::Player => {
                    if self
                        .sink
                        .send(Message::Text(event.to_frame()))
                        .await
                        .is_err()
                    {
                        return false;
                    }
                }
                EventTarget::All => {
                    self.groups.publish(&self.session_group, Arc::new(event));
                }
            }
        }
        true
    }

    async fn send_error(&mut self, reason: &str) -> bool {
        let event = ServerEvent::to_sender(EventType::Error, json(&reason));
        self.sink
            .send(Message::Text(event.to_frame()))
            .await
            .is_ok()
    }

    /// Disconnect sequence: leave the session, drop the group
    /// subscriptions and give the controller reference back
    async fn shutdown(mut self) {
        let result = {
            let mut controller = self.controller.lock().await;
            controller
                .player_event(PlayerEvent::left(self.player.clone()))
                .await
        };
        match result {
            // The own socket is already gone; the broadcasts still
            // reach everyone else
            Ok(events) => {
                self.dispatch(events).await;
            }
            Err(err) => error!("Leave failed (session: {}): {err}", self.session_key),
        }

        if self.is_host {
            self.groups.unsubscribe(HOSTS_GROUP, self.id);
        }
        self.groups.unsubscribe(&self.session_group, self.id);
        self.registry.release(self.session_key).await;
        debug!("Connection {} closed", self.id);
    }
}

/// Outcome of inspecting an inbound frame's type field
enum FrameType {
    Accepted(ClientEventType),
    /// A type only the glue itself may produce
    Reserved,
    Missing,
    Unknown,
}

fn classify(ty: Option<&str>) -> FrameType {
    match ty {
        None => FrameType::Missing,
        Some(raw) => match ClientEventType::from_wire(raw) {
            Some(ty) if ty.is_reserved() => FrameType::Reserved,
            Some(ty) => FrameType::Accepted(ty),
            None => FrameType::Unknown,
        },
    }
}

/// Works out which player is connecting: a valid token wins over the
/// username parameter, an invalid one falls back to it, a bare username
/// creates a fresh anonymous player.
async fn resolve_player(
    db: &DatabaseConnection,
    tokens: &Tokens,
    query: &PlayQuery,
    path_token: Option<String>,
) -> Result<Option<Player>, sea_orm::DbErr> {
    let token = path_token.or_else(|| query.jwt.clone());
    if let Some(token) = token {
        if let Ok(player_id) = tokens.verify(&token) {
            if let Some(player) = Player::by_id(db, player_id).await? {
                return Ok(Some(player));
            }
        }
    }

    match query.username.as_deref() {
        Some(username) if !username.is_empty() => Ok(Some(
            Player::create_anonymous(db, username.to_string()).await?,
        )),
        _ => Ok(None),
    }
}

/// Sends an error event followed by an application close frame, used
/// for connections refused before they joined
async fn refuse(sink: &mut SplitSink<WebSocket, Message>, reason: &str) {
    let event = ServerEvent::to_sender(EventType::Error, json(&reason));
    let _ = sink.send(Message::Text(event.to_frame())).await;
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_JOIN_REFUSED,
            reason: Cow::from("join refused"),
        })))
        .await;
}

#[cfg(test)]
mod test {
    use super::{classify, FrameType};
    use crate::services::game::event::ClientEventType;

    #[test]
    fn test_client_types_pass_through() {
        for (raw, expected) in [
            ("ready_state", ClientEventType::Ready),
            ("word", ClientEventType::Word),
            ("vote", ClientEventType::Vote),
            ("switch_team", ClientEventType::SwitchTeam),
        ] {
            match classify(Some(raw)) {
                FrameType::Accepted(ty) => assert_eq!(ty, expected),
                _ => panic!("`{raw}` should be accepted"),
            }
        }
    }

    #[test]
    fn test_reserved_and_missing_types_rejected() {
        assert!(matches!(classify(None), FrameType::Missing));
        for raw in ["player_joined", "player_left", "tick"] {
            assert!(matches!(classify(Some(raw)), FrameType::Reserved));
        }
        assert!(matches!(classify(Some("bogus")), FrameType::Unknown));
    }
}
