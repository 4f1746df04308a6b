//! In-memory per-session player state. The [PlayerController] owns every
//! volatile record for one session: the local players, the two teams when
//! the session runs in team mode, the ready/voted counters and the
//! uniqueness of displayed names.

use crate::database::entities::session_results::NewSessionResult;
use crate::database::entities::{GameMode, GameSession, Player, SessionResult};
use crate::services::game::error::ControllerError;
use crate::services::game::options::{GameOptions, WinCondition};
use crate::services::game::snapshot::{
    CompetitorsSnapshot, PlayerSnapshot, ResultFields, TeamSnapshot, TeamsSnapshot,
};
use crate::utils::types::{PlayerId, SessionId};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// The two team slots of a team-mode session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamName {
    Red,
    Blue,
}

impl TeamName {
    pub fn from_wire(name: &str) -> Option<TeamName> {
        match name {
            "red" => Some(TeamName::Red),
            "blue" => Some(TeamName::Blue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamName::Red => "red",
            TeamName::Blue => "blue",
        }
    }
}

/// Volatile state for one participant of a session
#[derive(Debug)]
pub struct LocalPlayer {
    /// Durable profile row the participant joined with
    pub record: Player,
    pub id: PlayerId,
    /// Name shown to other players, deduplicated within the session
    pub displayed_name: String,
    /// Name the player joined with, restored when they leave
    original_name: String,
    pub score: i64,
    pub speed: f64,
    /// Characters typed correctly since the game started
    pub total_word_length: u64,
    pub correct_words: u32,
    pub incorrect_words: u32,
    pub time_left: Option<f64>,
    pub is_ready: bool,
    pub is_out: bool,
    pub is_winner: Option<bool>,
    pub team_name: Option<TeamName>,
    pub voted_for: Option<GameMode>,
    /// Position of the next expected word in the session word list
    pub next_word: usize,
}

impl LocalPlayer {
    fn new(record: Player, displayed_name: String) -> LocalPlayer {
        let original_name = record.display_name.clone();
        LocalPlayer {
            id: record.id,
            record,
            displayed_name,
            original_name,
            score: 0,
            speed: 0.0,
            total_word_length: 0,
            correct_words: 0,
            incorrect_words: 0,
            time_left: None,
            is_ready: false,
            is_out: false,
            is_winner: None,
            team_name: None,
            voted_for: None,
            next_word: 0,
        }
    }

    /// Share of submitted words that were wrong
    pub fn mistake_ratio(&self) -> f64 {
        let total = self.correct_words + self.incorrect_words;
        if total == 0 {
            return 0.0;
        }
        self.incorrect_words as f64 / total as f64
    }
}

/// One team of a team-mode session. Score, speed and the out state are
/// derived from the members; only the remaining time is stored on the
/// team itself.
#[derive(Debug)]
pub struct LocalTeam {
    members: Vec<PlayerId>,
    pub time_left: Option<f64>,
}

impl LocalTeam {
    fn new() -> LocalTeam {
        LocalTeam {
            members: Vec::new(),
            time_left: None,
        }
    }

}

#[derive(Debug)]
struct TeamPair {
    red: LocalTeam,
    blue: LocalTeam,
}

impl TeamPair {
    fn team_mut(&mut self, name: TeamName) -> &mut LocalTeam {
        match name {
            TeamName::Red => &mut self.red,
            TeamName::Blue => &mut self.blue,
        }
    }
}

/// Owns the set of local players (and teams) for one session
#[derive(Debug)]
pub struct PlayerController {
    db: DatabaseConnection,
    session_id: SessionId,
    players_max: u32,
    options: GameOptions,
    players: BTreeMap<PlayerId, LocalPlayer>,
    teams: Option<TeamPair>,
    ready_count: usize,
    voted_count: usize,
    /// Displayed names currently taken within the session
    names: HashSet<String>,
}

impl PlayerController {
    pub fn new(session: &GameSession, options: GameOptions, db: DatabaseConnection) -> Self {
        let teams = options.team_mode.then(|| TeamPair {
            red: LocalTeam::new(),
            blue: LocalTeam::new(),
        });
        Self {
            db,
            session_id: session.id,
            players_max: session.players_max,
            options,
            players: BTreeMap::new(),
            teams,
            ready_count: 0,
            voted_count: 0,
            names: HashSet::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready_count
    }

    pub fn voted_count(&self) -> usize {
        self.voted_count
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&LocalPlayer> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut LocalPlayer> {
        self.players.get_mut(&id)
    }

    /// Some present player, if any. Used for host re-election.
    pub fn any_player(&self) -> Option<&LocalPlayer> {
        self.players.values().next()
    }

    /// Adds a player to the session. Re-adding an already present player
    /// returns the existing local record unchanged.
    pub async fn add_player(&mut self, record: Player) -> Result<&LocalPlayer, ControllerError> {
        let id = record.id;
        if self.players.contains_key(&id) {
            return Ok(self.players.get(&id).expect("player vanished from session"));
        }

        if self.players_max > 0 && self.player_count() >= self.players_max as usize {
            return Err(ControllerError::JoinRefused(
                "max players limit was reached".to_string(),
            ));
        }

        let displayed_name = self.claim_unique_name(&record.display_name);
        let mut player = LocalPlayer::new(record, displayed_name);

        if let Some(teams) = self.teams.as_mut() {
            // Balance by member count, ties go to red
            let team_name = if teams.red.members.len() <= teams.blue.members.len() {
                TeamName::Red
            } else {
                TeamName::Blue
            };
            teams.team_mut(team_name).members.push(id);
            player.team_name = Some(team_name);
        }

        self.players.insert(id, player);
        self.update_session_record().await?;

        Ok(self.players.get(&id).expect("player vanished from session"))
    }

    /// Removes a player from the session, handing back their record with
    /// the original displayed name restored. Calling this for a player
    /// that is not present is a programmer error.
    pub async fn remove_player(&mut self, id: PlayerId) -> Result<LocalPlayer, ControllerError> {
        let mut player = self
            .players
            .remove(&id)
            .expect("removed player is not in the session");

        if player.is_ready {
            self.ready_count -= 1;
        }
        if player.voted_for.is_some() {
            self.voted_count -= 1;
        }

        self.names.remove(&player.displayed_name);
        player.displayed_name = player.original_name.clone();

        if let (Some(teams), Some(team_name)) = (self.teams.as_mut(), player.team_name) {
            teams.team_mut(team_name).members.retain(|member| *member != id);
        }

        self.update_session_record().await?;
        Ok(player)
    }

    /// Updates the ready counter only when the flag actually flips
    pub fn set_ready_state(&mut self, id: PlayerId, state: bool) {
        if let Some(player) = self.players.get_mut(&id) {
            if player.is_ready != state {
                player.is_ready = state;
                if state {
                    self.ready_count += 1;
                } else {
                    self.ready_count -= 1;
                }
            }
        }
    }

    /// Records a vote for the next game mode. The first recognized vote
    /// of a player increments the counter, later votes replace the
    /// choice without recounting.
    pub fn set_player_vote(&mut self, id: PlayerId, label: &str) -> Result<(), ControllerError> {
        let mode = GameMode::from_label(label)
            .ok_or_else(|| ControllerError::InvalidModeChoice(label.to_string()))?;
        if let Some(player) = self.players.get_mut(&id) {
            if player.voted_for.is_none() {
                self.voted_count += 1;
            }
            player.voted_for = Some(mode);
        }
        Ok(())
    }

    /// Moves a player onto the requested team. A no-op when the player
    /// is already on it.
    pub fn set_player_team(&mut self, id: PlayerId, team: &str) -> Result<(), ControllerError> {
        if self.teams.is_none() {
            return Err(ControllerError::InvalidOperation(
                "this session has no teams".to_string(),
            ));
        }
        let target = TeamName::from_wire(team)
            .ok_or_else(|| ControllerError::InvalidMessage(format!("unknown team `{team}`")))?;

        let Some(player) = self.players.get_mut(&id) else {
            return Ok(());
        };
        let current = player.team_name.expect("team player without a team");
        if current == target {
            return Ok(());
        }
        player.team_name = Some(target);

        let teams = self.teams.as_mut().expect("teams vanished mid-switch");
        teams.team_mut(current).members.retain(|member| *member != id);
        teams.team_mut(target).members.push(id);
        Ok(())
    }

    /// Current vote tally over the modes that received votes
    pub fn vote_counts(&self) -> HashMap<GameMode, usize> {
        let mut counts = HashMap::new();
        for player in self.players.values() {
            if let Some(mode) = player.voted_for {
                *counts.entry(mode).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Grants each competitor its starting time budget
    pub fn set_time_left_all(&mut self, duration: f64) {
        if let Some(teams) = self.teams.as_mut() {
            teams.red.time_left = Some(duration);
            teams.blue.time_left = Some(duration);
        } else {
            for player in self.players.values_mut() {
                player.time_left = Some(duration);
            }
        }
    }

    /// Adds the correct-word time bonus to the player's competitor,
    /// clamped to the configured duration
    pub fn add_time_bonus(&mut self, id: PlayerId, bonus: f64) {
        let cap = self.options.game_duration as f64;
        if let Some(teams) = self.teams.as_mut() {
            let Some(team_name) = self.players.get(&id).and_then(|player| player.team_name) else {
                return;
            };
            let team = teams.team_mut(team_name);
            if let Some(time_left) = team.time_left.as_mut() {
                *time_left = cap.min(*time_left + bonus);
            }
        } else if let Some(player) = self.players.get_mut(&id) {
            if let Some(time_left) = player.time_left.as_mut() {
                *time_left = cap.min(*time_left + bonus);
            }
        }
    }

    /// Advances every competitor's clock by the provided decrement.
    /// Under survival, competitors that cross zero are clamped and
    /// marked out.
    pub fn apply_time_decay(&mut self, decrement: f64) {
        let survival = self.options.win_condition == WinCondition::Survival;
        if let Some(teams) = self.teams.as_mut() {
            for team in [&mut teams.red, &mut teams.blue] {
                let Some(time_left) = team.time_left.as_mut() else {
                    continue;
                };
                *time_left -= decrement;
                if survival && *time_left <= 0.0 {
                    *time_left = 0.0;
                    for member in &team.members {
                        if let Some(player) = self.players.get_mut(member) {
                            player.is_out = true;
                        }
                    }
                }
            }
        } else {
            for player in self.players.values_mut() {
                let Some(time_left) = player.time_left.as_mut() else {
                    continue;
                };
                *time_left -= decrement;
                if survival && *time_left <= 0.0 {
                    *time_left = 0.0;
                    player.is_out = true;
                }
            }
        }
    }

    /// Number of competitors the win conditions operate over. In team
    /// mode this is always both teams.
    pub fn competitor_count(&self) -> usize {
        if self.teams.is_some() {
            2
        } else {
            self.players.len()
        }
    }

    /// Number of competitors that are out
    pub fn out_count(&self) -> usize {
        if let Some(teams) = &self.teams {
            [&teams.red, &teams.blue]
                .into_iter()
                .filter(|team| self.team_is_out(team))
                .count()
        } else {
            self.players.values().filter(|player| player.is_out).count()
        }
    }

    /// Competitor scores, used for the points-difference condition
    pub fn competitor_scores(&self) -> Vec<i64> {
        if let Some(teams) = &self.teams {
            vec![self.team_score(&teams.red), self.team_score(&teams.blue)]
        } else {
            self.players.values().map(|player| player.score).collect()
        }
    }

    /// Flags winners according to the win condition. A single remaining
    /// solo competitor always wins.
    pub fn mark_winners(&mut self, win_condition: WinCondition) {
        if self.players.is_empty() {
            return;
        }
        if self.teams.is_some() {
            self.mark_team_winners(win_condition);
        } else {
            self.mark_solo_winners(win_condition);
        }
    }

    fn mark_solo_winners(&mut self, win_condition: WinCondition) {
        match win_condition {
            WinCondition::BestScore => {
                let best = self.players.values().map(|p| p.score).max().unwrap_or(0);
                for player in self.players.values_mut() {
                    player.is_winner = Some(player.score == best);
                }
            }
            WinCondition::BestTime => {
                let best = self
                    .players
                    .values()
                    .map(|p| p.time_left.unwrap_or(0.0))
                    .fold(f64::MIN, f64::max);
                for player in self.players.values_mut() {
                    player.is_winner = Some(player.time_left.unwrap_or(0.0) == best);
                }
            }
            WinCondition::Survival => {
                for player in self.players.values_mut() {
                    player.is_winner = Some(!player.is_out);
                }
            }
        }
        if self.players.len() == 1 {
            let player = self
                .players
                .values_mut()
                .next()
                .expect("single player vanished");
            player.is_winner = Some(true);
        }
    }

    fn mark_team_winners(&mut self, win_condition: WinCondition) {
        let teams = self.teams.as_ref().expect("team winners without teams");
        let (red_wins, blue_wins) = match win_condition {
            WinCondition::BestScore => {
                let red = self.team_score(&teams.red);
                let blue = self.team_score(&teams.blue);
                (red >= blue, blue >= red)
            }
            WinCondition::BestTime => {
                let red = teams.red.time_left.unwrap_or(0.0);
                let blue = teams.blue.time_left.unwrap_or(0.0);
                (red >= blue, blue >= red)
            }
            WinCondition::Survival => (
                !self.team_is_out(&teams.red),
                !self.team_is_out(&teams.blue),
            ),
        };

        let red_members = teams.red.members.clone();
        let blue_members = teams.blue.members.clone();
        for member in red_members {
            if let Some(player) = self.players.get_mut(&member) {
                player.is_winner = Some(red_wins);
            }
        }
        for member in blue_members {
            if let Some(player) = self.players.get_mut(&member) {
                player.is_winner = Some(blue_wins);
            }
        }
    }

    /// The competitors field broadcast to clients
    pub fn snapshot(&self, include_results: bool) -> CompetitorsSnapshot {
        if let Some(teams) = &self.teams {
            CompetitorsSnapshot::Teams {
                teams: TeamsSnapshot {
                    red: self.team_snapshot(&teams.red, include_results),
                    blue: self.team_snapshot(&teams.blue, include_results),
                },
            }
        } else {
            CompetitorsSnapshot::Solo {
                players: self
                    .players
                    .values()
                    .map(|player| self.build_snapshot(player, include_results))
                    .collect(),
            }
        }
    }

    /// Snapshot of a single player, used for the initial state event
    pub fn player_snapshot(&self, id: PlayerId, include_results: bool) -> Option<PlayerSnapshot> {
        self.players
            .get(&id)
            .map(|player| self.build_snapshot(player, include_results))
    }

    /// Per-player result list in join order, teams flattened red first
    pub fn results(&self) -> Vec<PlayerSnapshot> {
        match &self.teams {
            Some(teams) => teams
                .red
                .members
                .iter()
                .chain(teams.blue.members.iter())
                .filter_map(|id| self.players.get(id))
                .map(|player| self.build_snapshot(player, true))
                .collect(),
            None => self
                .players
                .values()
                .map(|player| self.build_snapshot(player, true))
                .collect(),
        }
    }

    /// Persists one result row per player through the repository
    pub async fn save_results(&self, session: &GameSession) -> Result<(), ControllerError> {
        let rows = self
            .players
            .values()
            .map(|player| NewSessionResult {
                player_id: Some(player.record.id),
                team: player.team_name.map(|team| team.as_str().to_string()),
                score: player.score,
                speed: player.speed.max(0.0),
                mistake_ratio: player.mistake_ratio(),
                is_winner: player.is_winner.unwrap_or(false),
                correct_words: player.correct_words,
                incorrect_words: player.incorrect_words,
            })
            .collect();
        SessionResult::save_batch(&self.db, session, rows).await?;
        Ok(())
    }

    fn team_score(&self, team: &LocalTeam) -> i64 {
        team.members
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|player| player.score)
            .sum()
    }

    fn team_speed(&self, team: &LocalTeam) -> f64 {
        if team.members.is_empty() {
            return 0.0;
        }
        let total: f64 = team
            .members
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|player| player.speed)
            .sum();
        total / team.members.len() as f64
    }

    fn team_is_out(&self, team: &LocalTeam) -> bool {
        team.members
            .iter()
            .filter_map(|id| self.players.get(id))
            .all(|player| player.is_out)
    }

    fn team_snapshot(&self, team: &LocalTeam, include_results: bool) -> TeamSnapshot {
        let survival = self.options.win_condition == WinCondition::Survival;
        TeamSnapshot {
            players: team
                .members
                .iter()
                .filter_map(|id| self.players.get(id))
                .map(|player| self.build_snapshot(player, include_results))
                .collect(),
            score: self.team_score(team),
            speed: self.team_speed(team),
            time_left: if self.options.game_duration > 0 {
                team.time_left
            } else {
                None
            },
            is_out: survival.then(|| self.team_is_out(team)),
        }
    }

    fn build_snapshot(&self, player: &LocalPlayer, include_results: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            id: player.id,
            displayed_name: player.displayed_name.clone(),
            score: player.score,
            speed: player.speed,
            is_ready: player.is_ready,
            time_left: if PlayerSnapshot::shows_time_left(&self.options) {
                player.time_left
            } else {
                None
            },
            is_out: PlayerSnapshot::shows_out_flag(&self.options).then_some(player.is_out),
            team_name: player.team_name,
            results: include_results.then(|| ResultFields {
                correct_words: player.correct_words,
                incorrect_words: player.incorrect_words,
                mistake_ratio: player.mistake_ratio(),
                is_winner: player.is_winner.unwrap_or(false),
            }),
        }
    }

    /// Claims a displayed name unique within this session, appending a
    /// random tag until no present player holds it
    fn claim_unique_name(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        while self.names.contains(&name) {
            let mut tag = [0u8; 3];
            rand::thread_rng().fill_bytes(&mut tag);
            name = format!("{base}#{}", Base64UrlUnpadded::encode_string(&tag));
        }
        self.names.insert(name.clone());
        name
    }

    async fn update_session_record(&self) -> Result<(), ControllerError> {
        GameSession::set_players_now(&self.db, self.session_id, self.player_count() as u32).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{PlayerController, TeamName};
    use crate::database::connect_test;
    use crate::database::entities::game_sessions::CreateGameSession;
    use crate::database::entities::{GameMode, GameSession, Player};
    use crate::services::game::error::ControllerError;
    use crate::services::game::options::GameOptions;
    use sea_orm::DatabaseConnection;

    async fn setup(mode: GameMode, players_max: u32) -> (DatabaseConnection, PlayerController) {
        let db = connect_test().await;
        let session = GameSession::create(
            &db,
            CreateGameSession {
                mode,
                name: "players test".to_string(),
                password: None,
                is_private: false,
                players_max,
                creator_id: None,
            },
        )
        .await
        .unwrap();
        let options = GameOptions::for_session(&session);
        let controller = PlayerController::new(&session, options, db.clone());
        (db, controller)
    }

    async fn player(db: &DatabaseConnection, name: &str) -> Player {
        Player::create_anonymous(db, name.to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn test_join_updates_session_record() {
        let (db, mut controller) = setup(GameMode::Single, 0).await;
        let alice = player(&db, "alice").await;
        controller.add_player(alice).await.unwrap();

        let session = GameSession::by_session_key(
            &db,
            GameSession::list_open(&db).await.unwrap()[0].session_key,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(session.players_now, 1);
    }

    #[tokio::test]
    async fn test_readd_is_idempotent() {
        let (db, mut controller) = setup(GameMode::Single, 0).await;
        let alice = player(&db, "alice").await;
        controller.add_player(alice.clone()).await.unwrap();
        controller.set_ready_state(alice.id, true);

        let readded = controller.add_player(alice).await.unwrap();
        assert!(readded.is_ready);
        assert_eq!(controller.player_count(), 1);
    }

    #[tokio::test]
    async fn test_cap_refuses_join() {
        let (db, mut controller) = setup(GameMode::Single, 1).await;
        controller.add_player(player(&db, "a").await).await.unwrap();
        let err = controller
            .add_player(player(&db, "b").await)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::JoinRefused(_)));
        assert_eq!(controller.player_count(), 1);
    }

    #[tokio::test]
    async fn test_name_collision_gets_tag() {
        let (db, mut controller) = setup(GameMode::Single, 0).await;
        let first = player(&db, "sam").await;
        let second = player(&db, "sam").await;
        controller.add_player(first.clone()).await.unwrap();
        controller.add_player(second.clone()).await.unwrap();

        let first_name = controller.get(first.id).unwrap().displayed_name.clone();
        let second_name = controller.get(second.id).unwrap().displayed_name.clone();
        assert_eq!(first_name, "sam");
        assert_ne!(second_name, "sam");
        assert!(second_name.starts_with("sam#"));
        // 3 random bytes encode to 4 base64url characters
        assert_eq!(second_name.len(), "sam#".len() + 4);

        // The tag is released when the player leaves
        controller.remove_player(second.id).await.unwrap();
        controller.add_player(second.clone()).await.unwrap();
        assert!(controller
            .get(second.id)
            .unwrap()
            .displayed_name
            .starts_with("sam#"));
    }

    #[tokio::test]
    async fn test_ready_counter_tracks_transitions() {
        let (db, mut controller) = setup(GameMode::Single, 0).await;
        let alice = player(&db, "alice").await;
        controller.add_player(alice.clone()).await.unwrap();

        controller.set_ready_state(alice.id, true);
        controller.set_ready_state(alice.id, true);
        assert_eq!(controller.ready_count(), 1);

        controller.set_ready_state(alice.id, false);
        controller.set_ready_state(alice.id, true);
        assert_eq!(controller.ready_count(), 1);

        controller.remove_player(alice.id).await.unwrap();
        assert_eq!(controller.ready_count(), 0);
    }

    #[tokio::test]
    async fn test_vote_replaces_without_recount() {
        let (db, mut controller) = setup(GameMode::Single, 0).await;
        let alice = player(&db, "alice").await;
        controller.add_player(alice.clone()).await.unwrap();

        controller.set_player_vote(alice.id, "single").unwrap();
        controller.set_player_vote(alice.id, "endless").unwrap();
        assert_eq!(controller.voted_count(), 1);
        assert_eq!(controller.vote_counts().get(&GameMode::Endless), Some(&1));
        assert_eq!(controller.vote_counts().get(&GameMode::Single), None);

        let err = controller.set_player_vote(alice.id, "blitz").unwrap_err();
        assert!(matches!(err, ControllerError::InvalidModeChoice(_)));
    }

    #[tokio::test]
    async fn test_team_balance_ties_to_red() {
        let (db, mut controller) = setup(GameMode::Tugofwar, 0).await;
        let a = player(&db, "a").await;
        let b = player(&db, "b").await;
        let c = player(&db, "c").await;
        controller.add_player(a.clone()).await.unwrap();
        controller.add_player(b.clone()).await.unwrap();
        controller.add_player(c.clone()).await.unwrap();

        assert_eq!(controller.get(a.id).unwrap().team_name, Some(TeamName::Red));
        assert_eq!(controller.get(b.id).unwrap().team_name, Some(TeamName::Blue));
        assert_eq!(controller.get(c.id).unwrap().team_name, Some(TeamName::Red));
    }

    #[tokio::test]
    async fn test_switch_team() {
        let (db, mut controller) = setup(GameMode::Tugofwar, 0).await;
        let a = player(&db, "a").await;
        controller.add_player(a.clone()).await.unwrap();

        controller.set_player_team(a.id, "blue").unwrap();
        assert_eq!(controller.get(a.id).unwrap().team_name, Some(TeamName::Blue));

        // No-op when already on the team
        controller.set_player_team(a.id, "blue").unwrap();
        assert_eq!(controller.get(a.id).unwrap().team_name, Some(TeamName::Blue));

        let err = controller.set_player_team(a.id, "green").unwrap_err();
        assert!(matches!(err, ControllerError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn test_switch_team_without_team_mode() {
        let (db, mut controller) = setup(GameMode::Single, 0).await;
        let a = player(&db, "a").await;
        controller.add_player(a.clone()).await.unwrap();

        let err = controller.set_player_team(a.id, "red").unwrap_err();
        assert!(matches!(err, ControllerError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_survival_decay_marks_out() {
        let (db, mut controller) = setup(GameMode::Endless, 0).await;
        let a = player(&db, "a").await;
        let b = player(&db, "b").await;
        controller.add_player(a.clone()).await.unwrap();
        controller.add_player(b.clone()).await.unwrap();
        controller.set_time_left_all(30.0);

        controller.get_mut(a.id).unwrap().time_left = Some(0.5);
        controller.apply_time_decay(1.0);

        let out = controller.get(a.id).unwrap();
        assert!(out.is_out);
        assert_eq!(out.time_left, Some(0.0));
        assert!(!controller.get(b.id).unwrap().is_out);
        assert_eq!(controller.out_count(), 1);
    }

    #[tokio::test]
    async fn test_time_bonus_is_clamped() {
        let (db, mut controller) = setup(GameMode::Endless, 0).await;
        let a = player(&db, "a").await;
        controller.add_player(a.clone()).await.unwrap();
        controller.set_time_left_all(30.0);
        controller.get_mut(a.id).unwrap().time_left = Some(29.5);

        controller.add_time_bonus(a.id, 3.0);
        assert_eq!(controller.get(a.id).unwrap().time_left, Some(30.0));
    }
}
