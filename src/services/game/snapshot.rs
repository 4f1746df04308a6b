//! Client-facing snapshots of session competitors. Which fields appear
//! depends on the session options: timed games expose `timeLeft`,
//! survival games expose `isOut`, team games nest players under their
//! teams, and result snapshots carry the extra accuracy fields. Field
//! names are camelCase on the wire.

use crate::services::game::options::{GameOptions, WinCondition};
use crate::services::game::player::TeamName;
use crate::utils::types::PlayerId;
use serde::Serialize;

/// One player as shown to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub displayed_name: String,
    pub score: i64,
    pub speed: f64,
    pub is_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<TeamName>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultFields>,
}

/// Extra per-player fields included once results are known
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFields {
    pub correct_words: u32,
    pub incorrect_words: u32,
    pub mistake_ratio: f64,
    pub is_winner: bool,
}

/// One team as shown to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub score: i64,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_out: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamsSnapshot {
    pub red: TeamSnapshot,
    pub blue: TeamSnapshot,
}

/// The competitors field broadcast to clients: flat player list in solo
/// sessions, team pair in team sessions
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CompetitorsSnapshot {
    Solo { players: Vec<PlayerSnapshot> },
    Teams { teams: TeamsSnapshot },
}

impl PlayerSnapshot {
    /// Whether player-level time remaining is part of the snapshot
    pub fn shows_time_left(options: &GameOptions) -> bool {
        options.game_duration > 0 && !options.team_mode
    }

    /// Whether the out flag is part of the snapshot
    pub fn shows_out_flag(options: &GameOptions) -> bool {
        options.win_condition == WinCondition::Survival
    }
}

#[cfg(test)]
mod test {
    use super::{CompetitorsSnapshot, PlayerSnapshot, ResultFields};

    fn snapshot() -> PlayerSnapshot {
        PlayerSnapshot {
            id: 7,
            displayed_name: "ada".to_string(),
            score: 15,
            speed: 2.5,
            is_ready: true,
            time_left: None,
            is_out: None,
            team_name: None,
            results: None,
        }
    }

    #[test]
    fn test_camel_case_and_absent_fields() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(value["displayedName"], "ada");
        assert_eq!(value["isReady"], true);
        assert!(value.get("timeLeft").is_none());
        assert!(value.get("isOut").is_none());
        assert!(value.get("teamName").is_none());
        assert!(value.get("correctWords").is_none());
    }

    #[test]
    fn test_results_are_flattened() {
        let mut snapshot = snapshot();
        snapshot.time_left = Some(12.5);
        snapshot.results = Some(ResultFields {
            correct_words: 3,
            incorrect_words: 1,
            mistake_ratio: 0.25,
            is_winner: true,
        });
        let value = serde_json::to_value(snapshot).unwrap();
        assert_eq!(value["timeLeft"], 12.5);
        assert_eq!(value["correctWords"], 3);
        assert_eq!(value["mistakeRatio"], 0.25);
        assert_eq!(value["isWinner"], true);
    }

    #[test]
    fn test_competitors_shape() {
        let solo = CompetitorsSnapshot::Solo {
            players: vec![snapshot()],
        };
        let value = serde_json::to_value(solo).unwrap();
        assert!(value["players"].is_array());
    }
}
