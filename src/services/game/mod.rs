//! Per-session game controllers. A [GameController] owns the state
//! machine of one session and is the single writer for everything that
//! happens inside it: joins and leaves, ready flags, word submissions,
//! host ticks, votes and team switches all enter through
//! [`player_event`](GameController::player_event) and come back out as
//! a list of events addressed at one connection or at the whole session.

use crate::database::entities::game_sessions::GameMode;
use crate::database::entities::{GameSession, Player};
use crate::utils::types::{PlayerId, SessionKey};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::seq::SliceRandom;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub mod error;
pub mod event;
pub mod options;
pub mod player;
pub mod registry;
pub mod snapshot;
pub mod words;

use error::ControllerError;
use event::{json, ClientEventType, EventType, PlayerEvent, ServerEvent};
use options::{GameOptions, WinCondition};
use player::PlayerController;
use words::{WordProvider, WordSource};

/// Stage the session is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Preparing,
    Playing,
    Voting,
    /// Voting resolved, a successor session exists. Nothing happens in
    /// this state anymore.
    Terminated,
}

impl GameState {
    fn as_str(&self) -> &'static str {
        match self {
            GameState::Preparing => "preparing",
            GameState::Playing => "playing",
            GameState::Voting => "voting",
            GameState::Terminated => "terminated",
        }
    }
}

/// Payload of a join event
#[derive(Default, Deserialize)]
struct JoinPayload {
    password: Option<String>,
}

/// One row of the votes update broadcast
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModeVotes {
    mode: &'static str,
    vote_count: usize,
}

/// The in-memory state machine of one session
#[derive(Debug)]
pub struct GameController {
    db: DatabaseConnection,
    session: GameSession,
    options: GameOptions,
    state: GameState,
    words: WordProvider,
    players: PlayerController,
    host_id: Option<PlayerId>,
    /// Scheduled start instant while the start countdown runs
    game_begins_at: Option<DateTime<Utc>>,
    /// Instant the clock runs out, set on entering playing for timed games
    game_ends_at: Option<DateTime<Utc>>,
    last_tick: Option<DateTime<Utc>>,
    next_session_key: Option<SessionKey>,
}

impl GameController {
    /// Loads the session and builds a fresh controller for it. Sessions
    /// that already started or finished cannot get a controller anymore.
    pub async fn create(
        db: DatabaseConnection,
        session_key: SessionKey,
        source: Arc<dyn WordSource>,
    ) -> Result<GameController, ControllerError> {
        let session = GameSession::by_session_key(&db, session_key)
            .await?
            .ok_or(ControllerError::NotFound)?;
        if session.started_at.is_some() || session.is_finished {
            return Err(ControllerError::GameOver);
        }

        let options = GameOptions::for_session(&session);
        let words = WordProvider::new(source);
        let players = PlayerController::new(&session, options, db.clone());

        debug!("Created controller (session: {})", session.session_key);

        Ok(GameController {
            db,
            session,
            options,
            state: GameState::Preparing,
            words,
            players,
            host_id: None,
            game_begins_at: None,
            game_ends_at: None,
            last_tick: None,
            next_session_key: None,
        })
    }

    /// Single entry point for everything that happens inside the
    /// session. Returns the events to deliver; handlers that chose to
    /// drop their event produce an empty list.
    pub async fn player_event(
        &mut self,
        event: PlayerEvent,
    ) -> Result<Vec<ServerEvent>, ControllerError> {
        let result = match event.ty {
            ClientEventType::Joined => self.handle_join(event).await,
            ClientEventType::Left => self.handle_leave(event).await,
            ClientEventType::Ready => self.handle_ready(event).await,
            ClientEventType::Word => self.handle_word(event),
            ClientEventType::Tick => self.handle_tick(event).await,
            ClientEventType::Vote => self.handle_vote(event).await,
            ClientEventType::SwitchTeam => self.handle_switch_team(event),
        };
        match result {
            Err(ControllerError::Discarded) => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    /// Makes the provided player the session host. The player must be
    /// present in the session.
    pub fn set_host(&mut self, player: &Player) -> Result<(), ControllerError> {
        if !self.players.contains(player.id) {
            return Err(ControllerError::InvalidOperation(format!(
                "player `{}` is not in the session",
                player.display_name
            )));
        }
        self.host_id = Some(player.id);
        Ok(())
    }

    pub fn session_key(&self) -> SessionKey {
        self.session.session_key
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    // Event handlers

    async fn handle_join(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        let payload: JoinPayload = match event.payload {
            None => JoinPayload::default(),
            Some(value) => serde_json::from_value(value)
                .map_err(|err| ControllerError::InvalidMessage(format!("invalid payload: {err}")))?,
        };
        self.ensure_can_join(&event.player, payload.password.as_deref())?;

        let player_id = event.player.id;
        self.players.add_player(event.player).await?;

        Ok(vec![
            self.initial_state_event(player_id),
            self.players_update_event(),
        ])
    }

    async fn handle_leave(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        let player_id = event.player.id;
        if !self.players.contains(player_id) {
            return Ok(Vec::new());
        }

        let removed = self.players.remove_player(player_id).await?;
        debug!(
            "Player `{}` left session {}",
            removed.displayed_name, self.session.session_key
        );

        let mut events = Vec::new();
        if self.host_id == Some(player_id) {
            events.push(self.elect_new_host());
        }
        if self.state == GameState::Voting && self.players.player_count() > 0 {
            events.push(self.votes_update_event());
        }
        events.push(self.players_update_event());
        events.extend(self.update_game_stage().await?);
        Ok(events)
    }

    async fn handle_ready(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        if !self.players.contains(event.player.id) {
            return Ok(Vec::new());
        }
        if self.state != GameState::Preparing {
            return Err(ControllerError::InvalidOperation(format!(
                "cannot change ready state during the {} stage",
                self.state.as_str()
            )));
        }
        let ready: bool = required_payload(event.payload)?;
        self.players.set_ready_state(event.player.id, ready);

        let mut events = vec![self.players_update_event()];
        events.extend(self.update_game_stage().await?);
        Ok(events)
    }

    fn handle_word(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        let player_id = event.player.id;
        if !self.players.contains(player_id) {
            return Ok(Vec::new());
        }
        if self.state != GameState::Playing {
            return Err(ControllerError::InvalidOperation(format!(
                "cannot submit words during the {} stage",
                self.state.as_str()
            )));
        }
        let word: String = required_payload(event.payload)?;

        let player = self.players.get(player_id).expect("word from missing player");
        if player.is_out {
            return Err(ControllerError::InvalidOperation(
                "cannot submit words when out".to_string(),
            ));
        }

        let expected = self.words.word_at(player.next_word);
        let matched = word == expected;
        let length = expected.chars().count();

        let started_at = self
            .session
            .started_at
            .expect("playing session without start timestamp");

        {
            let player = self
                .players
                .get_mut(player_id)
                .expect("word from missing player");
            player.next_word += 1;
            if matched {
                player.score += length as i64;
                player.total_word_length += length as u64;
                let elapsed = elapsed_seconds(started_at, Utc::now()).max(0.001);
                player.speed = player.total_word_length as f64 / elapsed;
                player.correct_words += 1;
            } else {
                player.incorrect_words += 1;
                if self.options.strict_mode {
                    player.score -= (length as f64 / 2.0).round() as i64;
                }
            }
        }

        if matched && self.options.time_per_word > 0.0 {
            let bonus = self.options.time_per_word * length as f64;
            self.players.add_time_bonus(player_id, bonus);
        }

        Ok(vec![self.new_word_event(), self.players_update_event()])
    }

    async fn handle_tick(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        if self.host_id != Some(event.player.id) {
            return Err(ControllerError::Discarded);
        }

        let mut events = Vec::new();
        match self.state {
            GameState::Preparing => {
                let begins_at = self.game_begins_at.ok_or(ControllerError::Discarded)?;
                if Utc::now() < begins_at {
                    return Err(ControllerError::Discarded);
                }
                events.push(self.start_game().await?);
            }
            GameState::Playing => {
                if self.options.game_duration > 0 {
                    let started_at = self
                        .session
                        .started_at
                        .expect("playing session without start timestamp");
                    let now = Utc::now();
                    let prev = self.last_tick.unwrap_or(started_at);
                    self.last_tick = Some(now);

                    let decrement = scaled_elapsed(
                        elapsed_seconds(started_at, now),
                        self.options.speed_up_percent,
                    ) - scaled_elapsed(
                        elapsed_seconds(started_at, prev),
                        self.options.speed_up_percent,
                    );
                    self.players.apply_time_decay(decrement);
                }
            }
            GameState::Voting | GameState::Terminated => return Err(ControllerError::Discarded),
        }

        events.push(self.players_update_event());
        events.extend(self.update_game_stage().await?);
        Ok(events)
    }

    async fn handle_vote(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        if !self.players.contains(event.player.id) {
            return Ok(Vec::new());
        }
        let mut events = Vec::new();
        if self.state == GameState::Voting {
            let label: String = required_payload(event.payload)?;
            if GameMode::from_label(&label).is_some() {
                self.players.set_player_vote(event.player.id, &label)?;
                events.push(self.votes_update_event());
            } else {
                events.push(self.modes_available_event());
            }
        }
        events.extend(self.update_game_stage().await?);
        Ok(events)
    }

    fn handle_switch_team(&mut self, event: PlayerEvent) -> Result<Vec<ServerEvent>, ControllerError> {
        if !self.players.contains(event.player.id) {
            return Ok(Vec::new());
        }
        if self.state != GameState::Preparing {
            return Err(ControllerError::InvalidOperation(format!(
                "cannot switch teams during the {} stage",
                self.state.as_str()
            )));
        }
        let team: String = required_payload(event.payload)?;
        self.players.set_player_team(event.player.id, &team)?;
        Ok(vec![self.players_update_event()])
    }

    // Stage transitions

    /// Runs the stage transition check after a handler finished its
    /// direct effects
    async fn update_game_stage(&mut self) -> Result<Vec<ServerEvent>, ControllerError> {
        let mut events = Vec::new();
        if self.can_begin_playing() {
            events.push(self.game_begins_event());
            if self.options.start_delay <= 0.0 {
                events.push(self.start_game().await?);
            } else {
                let delay = Duration::milliseconds((self.options.start_delay * 1000.0) as i64);
                self.game_begins_at = Some(Utc::now() + delay);
            }
        } else if self.can_begin_voting() {
            events.push(self.finish_game().await?);
        } else if self.can_enter_next_game() {
            events.push(self.create_next_game().await?);
        }
        Ok(events)
    }

    fn can_begin_playing(&self) -> bool {
        self.state == GameState::Preparing
            && self.players.player_count() > 0
            && self.players.ready_count() >= self.players.player_count()
    }

    fn can_begin_voting(&self) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        if self.players.player_count() == 0 {
            return true;
        }

        if self.options.win_condition == WinCondition::Survival {
            let out = self.players.out_count();
            return out > 0 && out >= self.players.competitor_count() - 1;
        }

        if self.options.game_duration > 0 {
            if let Some(ends_at) = self.game_ends_at {
                if ends_at <= Utc::now() {
                    return true;
                }
            }
        }

        if self.options.points_difference > 0 {
            let mut scores = self.players.competitor_scores();
            scores.sort_unstable_by(|a, b| b.cmp(a));
            if let (Some(top), Some(second)) = (scores.first(), scores.get(1)) {
                if top - second >= self.options.points_difference {
                    return true;
                }
            }
        }

        false
    }

    fn can_enter_next_game(&self) -> bool {
        self.state == GameState::Voting
            && self.players.player_count() > 0
            && self.players.voted_count() >= self.players.player_count()
    }

    /// Enters the playing stage: stamps the session start, hands every
    /// competitor its time budget and schedules the game end
    async fn start_game(&mut self) -> Result<ServerEvent, ControllerError> {
        self.state = GameState::Playing;
        self.session = self.session.clone().start(&self.db).await?;

        if self.options.game_duration > 0 {
            let duration = self.options.game_duration;
            self.players.set_time_left_all(duration as f64);
            let started_at = self
                .session
                .started_at
                .expect("started session without start timestamp");
            self.game_ends_at = Some(started_at + Duration::seconds(duration as i64));
        }

        info!("Session {} started", self.session.session_key);
        Ok(ServerEvent::all(EventType::StartGame, json(&serde_json::Map::new())))
    }

    /// Enters the voting stage: marks the session finished, flags the
    /// winners and persists the results. A failure to persist aborts
    /// the transition.
    async fn finish_game(&mut self) -> Result<ServerEvent, ControllerError> {
        self.state = GameState::Voting;
        self.session = self.session.clone().finish(&self.db).await?;

        self.players.mark_winners(self.options.win_condition);
        self.players.save_results(&self.session).await?;

        info!("Session {} finished", self.session.session_key);
        let results = self.players.results();
        Ok(ServerEvent::all(EventType::GameOver, json(&results)))
    }

    /// Resolves the vote: creates the successor session with the
    /// winning mode (ties broken uniformly at random) and terminates
    /// this controller's state machine
    async fn create_next_game(&mut self) -> Result<ServerEvent, ControllerError> {
        let counts = self.players.vote_counts();
        let best = counts
            .values()
            .copied()
            .max()
            .expect("voting finished without a single vote");
        let candidates: Vec<GameMode> = counts
            .into_iter()
            .filter(|(_, count)| *count == best)
            .map(|(mode, _)| mode)
            .collect();
        let new_mode = *candidates
            .choose(&mut rand::thread_rng())
            .expect("no candidate modes");

        let next = self.session.create_from_previous(&self.db, new_mode).await?;
        self.next_session_key = Some(next.session_key);
        self.state = GameState::Terminated;

        info!(
            "Session {} continues as {} ({})",
            self.session.session_key,
            next.session_key,
            new_mode.label()
        );
        Ok(ServerEvent::all(EventType::NewGame, json(&next.session_key)))
    }

    // Admission

    fn ensure_can_join(
        &self,
        player: &Player,
        password: Option<&str>,
    ) -> Result<(), ControllerError> {
        if self.session.players_max > 0
            && self.players.player_count() >= self.session.players_max as usize
        {
            return Err(ControllerError::JoinRefused(
                "max players limit was reached".to_string(),
            ));
        }
        if self.state != GameState::Preparing {
            return Err(ControllerError::JoinRefused(
                "the game has already started".to_string(),
            ));
        }
        if self.players.contains(player.id) {
            return Err(ControllerError::JoinRefused(
                "player is already in the session".to_string(),
            ));
        }
        if !self.session.check_password(password) {
            return Err(ControllerError::JoinRefused(
                "wrong session password".to_string(),
            ));
        }
        Ok(())
    }

    // Outbound event builders

    fn initial_state_event(&mut self, player_id: PlayerId) -> ServerEvent {
        let mut data = json(&self.players.snapshot(false));
        let object = data.as_object_mut().expect("competitors snapshot is an object");
        object.insert(
            "player".to_string(),
            json(
                &self
                    .players
                    .player_snapshot(player_id, false)
                    .expect("joined player missing from session"),
            ),
        );
        object.insert("words".to_string(), json(&self.words.words()));
        ServerEvent::to_sender(EventType::InitialState, data)
    }

    fn players_update_event(&self) -> ServerEvent {
        ServerEvent::all(EventType::PlayersUpdate, json(&self.players.snapshot(false)))
    }

    fn game_begins_event(&self) -> ServerEvent {
        ServerEvent::all(EventType::GameBegins, json(&self.options.start_delay))
    }

    fn new_word_event(&mut self) -> ServerEvent {
        ServerEvent::all(EventType::NewWord, json(&self.words.next_word()))
    }

    fn votes_update_event(&self) -> ServerEvent {
        let counts = self.players.vote_counts();
        let tally: Vec<ModeVotes> = GameMode::ALL
            .into_iter()
            .map(|mode| ModeVotes {
                mode: mode.label(),
                vote_count: counts.get(&mode).copied().unwrap_or(0),
            })
            .collect();
        ServerEvent::all(EventType::VotesUpdate, json(&tally))
    }

    fn modes_available_event(&self) -> ServerEvent {
        let labels: Vec<&'static str> = GameMode::ALL.into_iter().map(|mode| mode.label()).collect();
        ServerEvent::to_sender(EventType::ModesAvailable, json(&labels))
    }

    /// Picks any remaining player as the new host, or clears the host
    /// when nobody is left
    fn elect_new_host(&mut self) -> ServerEvent {
        self.host_id = self.players.any_player().map(|player| player.id);
        ServerEvent::all(EventType::NewHost, json(&self.host_id))
    }
}

/// Seconds between two instants
fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Elapsed game seconds raised to the speed-up exponent. The per-tick
/// time-left decrement is the difference of this value between two
/// consecutive ticks, so the clock drains faster the longer the game
/// runs.
fn scaled_elapsed(seconds: f64, speed_up_percent: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    seconds.powf(1.0 + speed_up_percent / 100.0)
}

fn required_payload<T: serde::de::DeserializeOwned>(
    payload: Option<Value>,
) -> Result<T, ControllerError> {
    let value = payload
        .ok_or_else(|| ControllerError::InvalidMessage("event payload is missing".to_string()))?;
    serde_json::from_value(value)
        .map_err(|err| ControllerError::InvalidMessage(format!("invalid payload: {err}")))
}

#[cfg(test)]
mod test {
    use super::error::ControllerError;
    use super::event::{ClientEventType, EventType, PlayerEvent, ServerEvent};
    use super::words::SequenceSource;
    use super::{scaled_elapsed, GameController, GameState};
    use crate::database::connect_test;
    use crate::database::entities::game_sessions::CreateGameSession;
    use crate::database::entities::{GameMode, GameSession, Player, SessionResult};
    use chrono::{Duration, Utc};
    use sea_orm::DatabaseConnection;
    use serde_json::json;
    use std::sync::Arc;

    async fn create_controller(
        mode: GameMode,
        players_max: u32,
    ) -> (DatabaseConnection, GameController) {
        let db = connect_test().await;
        let session = GameSession::create(
            &db,
            CreateGameSession {
                mode,
                name: "controller test".to_string(),
                password: None,
                is_private: false,
                players_max,
                creator_id: None,
            },
        )
        .await
        .unwrap();
        let controller =
            GameController::create(db.clone(), session.session_key, Arc::new(SequenceSource::new()))
                .await
                .unwrap();
        (db, controller)
    }

    async fn join(
        controller: &mut GameController,
        db: &DatabaseConnection,
        name: &str,
    ) -> (Player, Vec<ServerEvent>) {
        let player = Player::create_anonymous(db, name.to_string()).await.unwrap();
        let events = controller
            .player_event(PlayerEvent::joined(player.clone(), None))
            .await
            .unwrap();
        (player, events)
    }

    fn types(events: &[ServerEvent]) -> Vec<EventType> {
        events.iter().map(|event| event.ty).collect()
    }

    async fn submit(
        controller: &mut GameController,
        player: &Player,
        ty: ClientEventType,
        payload: serde_json::Value,
    ) -> Vec<ServerEvent> {
        controller
            .player_event(PlayerEvent::message(ty, player.clone(), Some(payload)))
            .await
            .unwrap()
    }

    #[test]
    fn test_decay_accelerates() {
        let early = scaled_elapsed(1.0, 15.0) - scaled_elapsed(0.5, 15.0);
        let late = scaled_elapsed(2.0, 15.0) - scaled_elapsed(1.5, 15.0);
        assert!(late > early);
        // Without speed-up the decrement is the plain elapsed time
        let plain = scaled_elapsed(2.0, 0.0) - scaled_elapsed(1.5, 0.0);
        assert!((plain - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_solo_happy_path() {
        let (db, mut controller) = create_controller(GameMode::Single, 1).await;
        let (player, join_events) = join(&mut controller, &db, "ada").await;
        assert_eq!(
            types(&join_events),
            vec![EventType::InitialState, EventType::PlayersUpdate]
        );

        // The initial state carries the player, the word list and the
        // competitors field
        let initial = &join_events[0].data;
        assert_eq!(initial["player"]["displayedName"], "ada");
        assert_eq!(initial["words"].as_array().unwrap().len(), 100);
        assert!(initial["players"].is_array());

        let ready_events = submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;
        assert_eq!(
            types(&ready_events),
            vec![
                EventType::PlayersUpdate,
                EventType::GameBegins,
                EventType::StartGame
            ]
        );
        assert_eq!(controller.state(), GameState::Playing);

        // The session record was stamped as started
        let session = GameSession::by_session_key(&db, controller.session_key())
            .await
            .unwrap()
            .unwrap();
        assert!(session.started_at.is_some());

        // First expected word is the first word of the session list
        let word_events =
            submit(&mut controller, &player, ClientEventType::Word, json!("word0")).await;
        assert_eq!(
            types(&word_events),
            vec![EventType::NewWord, EventType::PlayersUpdate]
        );

        let local = controller.players.get(player.id).unwrap();
        assert_eq!(local.score, "word0".chars().count() as i64);
        assert_eq!(local.correct_words, 1);
        assert_eq!(local.next_word, 1);
        assert!(local.speed > 0.0);
    }

    #[tokio::test]
    async fn test_join_twice_is_refused() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let (player, _) = join(&mut controller, &db, "ada").await;

        let err = controller
            .player_event(PlayerEvent::joined(player.clone(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::JoinRefused(_)));
        assert_eq!(controller.players.player_count(), 1);
    }

    #[tokio::test]
    async fn test_join_with_password() {
        let db = connect_test().await;
        let session = GameSession::create(
            &db,
            CreateGameSession {
                mode: GameMode::Single,
                name: "private".to_string(),
                password: Some("sesame".to_string()),
                is_private: true,
                players_max: 0,
                creator_id: None,
            },
        )
        .await
        .unwrap();
        let mut controller =
            GameController::create(db.clone(), session.session_key, Arc::new(SequenceSource::new()))
                .await
                .unwrap();

        let player = Player::create_anonymous(&db, "ada".to_string()).await.unwrap();
        let err = controller
            .player_event(PlayerEvent::joined(player.clone(), Some("wrong".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::JoinRefused(_)));

        let events = controller
            .player_event(PlayerEvent::joined(player, Some("sesame".to_string())))
            .await
            .unwrap();
        assert_eq!(types(&events)[0], EventType::InitialState);
    }

    #[tokio::test]
    async fn test_controller_refused_for_started_session() {
        let db = connect_test().await;
        let session = GameSession::create(
            &db,
            CreateGameSession {
                mode: GameMode::Single,
                name: "started".to_string(),
                password: None,
                is_private: false,
                players_max: 0,
                creator_id: None,
            },
        )
        .await
        .unwrap();
        let session = session.start(&db).await.unwrap();

        let err =
            GameController::create(db.clone(), session.session_key, Arc::new(SequenceSource::new()))
                .await
                .unwrap_err();
        assert!(matches!(err, ControllerError::GameOver));

        let err = GameController::create(db, uuid::Uuid::new_v4(), Arc::new(SequenceSource::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NotFound));
    }

    #[tokio::test]
    async fn test_join_leave_cascade_with_delay() {
        let (db, mut controller) = create_controller(GameMode::Single, 2).await;
        let (a, _) = join(&mut controller, &db, "a").await;
        let (b, _) = join(&mut controller, &db, "b").await;

        submit(&mut controller, &a, ClientEventType::Ready, json!(true)).await;
        assert_eq!(controller.players.ready_count(), 1);

        // B leaving with A already ready makes everyone ready: the game
        // stages its start but does not fire it because of the delay
        let leave_events = controller
            .player_event(PlayerEvent::left(b))
            .await
            .unwrap();
        assert_eq!(
            types(&leave_events),
            vec![EventType::PlayersUpdate, EventType::GameBegins]
        );
        assert_eq!(controller.state(), GameState::Preparing);
        assert!(controller.game_begins_at.is_some());
    }

    #[tokio::test]
    async fn test_staged_start_fires_on_host_tick() {
        let (db, mut controller) = create_controller(GameMode::Single, 2).await;
        let (a, _) = join(&mut controller, &db, "a").await;
        let (b, _) = join(&mut controller, &db, "b").await;
        controller.set_host(&a).unwrap();

        submit(&mut controller, &a, ClientEventType::Ready, json!(true)).await;
        submit(&mut controller, &b, ClientEventType::Ready, json!(true)).await;
        assert_eq!(controller.state(), GameState::Preparing);

        // Tick before the scheduled instant does nothing
        let events = controller
            .player_event(PlayerEvent::tick(a.clone()))
            .await
            .unwrap();
        assert!(events.is_empty());

        // Pretend the countdown has elapsed
        controller.game_begins_at = Some(Utc::now() - Duration::milliseconds(10));
        let events = controller.player_event(PlayerEvent::tick(a)).await.unwrap();
        assert_eq!(types(&events)[0], EventType::StartGame);
        assert_eq!(controller.state(), GameState::Playing);
    }

    #[tokio::test]
    async fn test_tick_from_non_host_is_discarded() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let (a, _) = join(&mut controller, &db, "a").await;
        let (b, _) = join(&mut controller, &db, "b").await;
        controller.set_host(&a).unwrap();

        let events = controller.player_event(PlayerEvent::tick(b)).await.unwrap();
        assert!(events.is_empty());
        assert!(controller.last_tick.is_none());
    }

    #[tokio::test]
    async fn test_host_migration_on_leave() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let (a, _) = join(&mut controller, &db, "a").await;
        let (b, _) = join(&mut controller, &db, "b").await;
        controller.set_host(&a).unwrap();

        let events = controller.player_event(PlayerEvent::left(a)).await.unwrap();
        assert_eq!(
            types(&events),
            vec![EventType::NewHost, EventType::PlayersUpdate]
        );
        assert_eq!(events[0].data, json!(b.id));
        assert_eq!(controller.host_id(), Some(b.id));

        // The last player leaving clears the host
        let events = controller.player_event(PlayerEvent::left(b)).await.unwrap();
        assert_eq!(events[0].ty, EventType::NewHost);
        assert_eq!(events[0].data, serde_json::Value::Null);
        assert_eq!(controller.host_id(), None);
    }

    #[tokio::test]
    async fn test_set_host_requires_presence() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let stranger = Player::create_anonymous(&db, "stranger".to_string())
            .await
            .unwrap();
        let err = controller.set_host(&stranger).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_word_mismatch_and_strict_penalty() {
        let (db, mut controller) = create_controller(GameMode::Ironwall, 1).await;
        let (player, _) = join(&mut controller, &db, "ada").await;
        submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;

        submit(&mut controller, &player, ClientEventType::Word, json!("nope")).await;

        let local = controller.players.get(player.id).unwrap();
        assert_eq!(local.correct_words, 0);
        assert_eq!(local.incorrect_words, 1);
        // Ironwall deducts half of the expected word's length
        let penalty = ("word0".chars().count() as f64 / 2.0).round() as i64;
        assert_eq!(local.score, -penalty);
        assert_eq!(local.next_word, 1);
    }

    #[tokio::test]
    async fn test_word_outside_playing_is_invalid() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let (player, _) = join(&mut controller, &db, "ada").await;

        let err = controller
            .player_event(PlayerEvent::message(
                ClientEventType::Word,
                player.clone(),
                Some(json!("word0")),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_ready_payload_must_be_bool() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let (player, _) = join(&mut controller, &db, "ada").await;

        let err = controller
            .player_event(PlayerEvent::message(
                ClientEventType::Ready,
                player,
                Some(json!("yes")),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn test_game_over_and_voting_resolution() {
        let (db, mut controller) = create_controller(GameMode::Single, 1).await;
        let (player, _) = join(&mut controller, &db, "ada").await;
        controller.set_host(&player).unwrap();
        submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;
        submit(&mut controller, &player, ClientEventType::Word, json!("word0")).await;

        // A vote during play is silently ignored
        let events = submit(&mut controller, &player, ClientEventType::Vote, json!("single")).await;
        assert!(events.is_empty());

        // Pretend the clock ran out; the next host tick ends the game
        controller.game_ends_at = Some(Utc::now() - Duration::seconds(1));
        let events = controller
            .player_event(PlayerEvent::tick(player.clone()))
            .await
            .unwrap();
        assert_eq!(
            types(&events),
            vec![EventType::PlayersUpdate, EventType::GameOver]
        );
        assert_eq!(controller.state(), GameState::Voting);

        // Results carry the winner with their accuracy fields
        let results = events[1].data.as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["isWinner"], true);
        assert_eq!(results[0]["correctWords"], 1);

        // The session row is finished and the result row persisted
        let session = GameSession::by_session_key(&db, controller.session_key())
            .await
            .unwrap()
            .unwrap();
        assert!(session.is_finished);
        let rows = SessionResult::for_session(&db, session.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_winner);

        // An unknown label answers with the available modes
        let events = submit(&mut controller, &player, ClientEventType::Vote, json!("blitz")).await;
        assert_eq!(types(&events), vec![EventType::ModesAvailable]);

        // The only player voting resolves the vote immediately
        let events = submit(&mut controller, &player, ClientEventType::Vote, json!("endless")).await;
        assert_eq!(
            types(&events),
            vec![EventType::VotesUpdate, EventType::NewGame]
        );
        assert_eq!(controller.state(), GameState::Terminated);

        let next_key = controller.next_session_key.expect("successor key missing");
        assert_eq!(events[1].data, json!(next_key));
        let next = GameSession::by_session_key(&db, next_key)
            .await
            .unwrap()
            .expect("successor session missing");
        assert_eq!(next.mode, GameMode::Endless);
        assert_eq!(next.name, "controller test");

        // Later votes are discarded and no second successor appears
        let events = submit(&mut controller, &player, ClientEventType::Vote, json!("single")).await;
        assert!(events.is_empty());
        assert_eq!(controller.next_session_key, Some(next_key));
    }

    #[tokio::test]
    async fn test_endless_survival_game_over() {
        let (db, mut controller) = create_controller(GameMode::Endless, 1).await;
        let (player, _) = join(&mut controller, &db, "ada").await;
        controller.set_host(&player).unwrap();
        submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;
        assert_eq!(controller.state(), GameState::Playing);
        assert_eq!(
            controller.players.get(player.id).unwrap().time_left,
            Some(30.0)
        );

        // Drain the clock to almost nothing, then let enough wall time
        // pass for the next tick to push it past zero
        controller.players.get_mut(player.id).unwrap().time_left = Some(0.5);
        tokio::time::sleep(std::time::Duration::from_millis(800)).await;

        let events = controller
            .player_event(PlayerEvent::tick(player.clone()))
            .await
            .unwrap();
        assert_eq!(
            types(&events),
            vec![EventType::PlayersUpdate, EventType::GameOver]
        );

        // The update already shows the player out with an empty clock
        let update_players = events[0].data["players"].as_array().unwrap();
        assert_eq!(update_players[0]["isOut"], true);
        assert_eq!(update_players[0]["timeLeft"], 0.0);

        // A sole competitor is always a winner
        let results = events[1].data.as_array().unwrap();
        assert_eq!(results[0]["isWinner"], true);
    }

    #[tokio::test]
    async fn test_word_submission_while_out_is_invalid() {
        let (db, mut controller) = create_controller(GameMode::Endless, 1).await;
        let (player, _) = join(&mut controller, &db, "ada").await;
        submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;

        controller.players.get_mut(player.id).unwrap().is_out = true;
        let err = controller
            .player_event(PlayerEvent::message(
                ClientEventType::Word,
                player,
                Some(json!("word0")),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_endless_word_grants_clamped_time_bonus() {
        let (db, mut controller) = create_controller(GameMode::Endless, 1).await;
        let (player, _) = join(&mut controller, &db, "ada").await;
        submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;

        controller.players.get_mut(player.id).unwrap().time_left = Some(10.0);
        submit(&mut controller, &player, ClientEventType::Word, json!("word0")).await;

        // Half a second per character, clamped to the 30s duration
        let expected = 10.0 + 0.5 * "word0".chars().count() as f64;
        assert_eq!(
            controller.players.get(player.id).unwrap().time_left,
            Some(expected)
        );

        controller.players.get_mut(player.id).unwrap().time_left = Some(29.0);
        submit(&mut controller, &player, ClientEventType::Word, json!("word1")).await;
        assert_eq!(
            controller.players.get(player.id).unwrap().time_left,
            Some(30.0)
        );
    }

    #[tokio::test]
    async fn test_tugofwar_points_difference() {
        let (db, mut controller) = create_controller(GameMode::Tugofwar, 0).await;
        let (a, _) = join(&mut controller, &db, "a").await;
        let (b, _) = join(&mut controller, &db, "b").await;
        controller.set_host(&a).unwrap();

        submit(&mut controller, &a, ClientEventType::Ready, json!(true)).await;
        submit(&mut controller, &b, ClientEventType::Ready, json!(true)).await;
        controller.game_begins_at = Some(Utc::now() - Duration::milliseconds(10));
        controller
            .player_event(PlayerEvent::tick(a.clone()))
            .await
            .unwrap();
        assert_eq!(controller.state(), GameState::Playing);

        // Feed A correct words until red leads by fifty points
        let mut index = 0;
        while controller.players.get(a.id).unwrap().score < 50 {
            let word = controller.words.word_at(index);
            submit(&mut controller, &a, ClientEventType::Word, json!(word)).await;
            index += 1;
        }

        // The gap only takes effect on the next host tick
        assert_eq!(controller.state(), GameState::Playing);
        let events = controller
            .player_event(PlayerEvent::tick(a.clone()))
            .await
            .unwrap();
        assert_eq!(
            types(&events),
            vec![EventType::PlayersUpdate, EventType::GameOver]
        );

        // Red wins as a team
        let results = events[1].data.as_array().unwrap();
        let winner = results
            .iter()
            .find(|row| row["id"] == json!(a.id))
            .expect("missing winner row");
        assert_eq!(winner["teamName"], "red");
        assert_eq!(winner["isWinner"], true);
        let loser = results
            .iter()
            .find(|row| row["id"] == json!(b.id))
            .expect("missing loser row");
        assert_eq!(loser["isWinner"], false);
    }

    #[tokio::test]
    async fn test_team_switch_reflected_in_update() {
        let (db, mut controller) = create_controller(GameMode::Tugofwar, 0).await;
        let (_a, _) = join(&mut controller, &db, "a").await;
        let (_b, _) = join(&mut controller, &db, "b").await;
        let (c, _) = join(&mut controller, &db, "c").await;

        let events = submit(&mut controller, &c, ClientEventType::SwitchTeam, json!("blue")).await;
        assert_eq!(types(&events), vec![EventType::PlayersUpdate]);

        let teams = &events[0].data["teams"];
        assert_eq!(teams["red"]["players"].as_array().unwrap().len(), 1);
        assert_eq!(teams["blue"]["players"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_counters_match_recount_after_sequence() {
        let (db, mut controller) = create_controller(GameMode::Single, 0).await;
        let (a, _) = join(&mut controller, &db, "a").await;
        let (b, _) = join(&mut controller, &db, "b").await;
        let (c, _) = join(&mut controller, &db, "c").await;

        submit(&mut controller, &a, ClientEventType::Ready, json!(true)).await;
        submit(&mut controller, &b, ClientEventType::Ready, json!(true)).await;
        submit(&mut controller, &b, ClientEventType::Ready, json!(false)).await;
        submit(&mut controller, &c, ClientEventType::Ready, json!(true)).await;
        controller.player_event(PlayerEvent::left(c)).await.unwrap();

        let recount = [a.id, b.id]
            .into_iter()
            .filter(|id| controller.players.get(*id).unwrap().is_ready)
            .count();
        assert_eq!(controller.players.ready_count(), recount);
        assert_eq!(controller.players.ready_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_session_in_playing_finishes() {
        let (db, mut controller) = create_controller(GameMode::Single, 1).await;
        let (player, _) = join(&mut controller, &db, "ada").await;
        submit(&mut controller, &player, ClientEventType::Ready, json!(true)).await;
        assert_eq!(controller.state(), GameState::Playing);

        let events = controller.player_event(PlayerEvent::left(player)).await.unwrap();
        assert!(types(&events).contains(&EventType::GameOver));
        assert_eq!(controller.state(), GameState::Voting);
    }
}
