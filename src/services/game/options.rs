//! Per-session rule set. The session mode is expanded into a flat
//! options value once at controller construction; all variant behavior
//! downstream keys off these fields rather than separate controller
//! types.

use crate::database::entities::{GameMode, GameSession};

/// How the end of a game is decided and winners are picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinCondition {
    /// Highest score wins when the clock runs out
    BestScore,
    /// Most time left wins when the clock runs out
    BestTime,
    /// Last competitor standing wins
    Survival,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameOptions {
    /// Game duration in seconds, zero meaning untimed
    pub game_duration: u32,
    pub win_condition: WinCondition,
    pub team_mode: bool,
    /// Exponent percentage for the nonlinear time-left decay
    pub speed_up_percent: f64,
    /// Score gap that ends the game immediately, zero meaning disabled
    pub points_difference: i64,
    /// Seconds of time-left granted per correct character
    pub time_per_word: f64,
    pub strict_mode: bool,
    /// Seconds between everyone being ready and the actual start
    pub start_delay: f64,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            game_duration: 60,
            win_condition: WinCondition::BestScore,
            team_mode: false,
            speed_up_percent: 0.0,
            points_difference: 0,
            time_per_word: 0.0,
            strict_mode: false,
            start_delay: 0.0,
        }
    }
}

impl GameOptions {
    /// Expands a session's mode into its rule set
    pub fn for_session(session: &GameSession) -> GameOptions {
        let mut options = GameOptions::default();
        match session.mode {
            GameMode::Single => {}
            GameMode::Ironwall => {
                options.strict_mode = true;
            }
            GameMode::Endless => {
                options.game_duration = 30;
                options.win_condition = WinCondition::Survival;
                options.time_per_word = 0.5;
                options.speed_up_percent = 15.0;
            }
            GameMode::Tugofwar => {
                options.game_duration = 0;
                options.team_mode = true;
                options.points_difference = 50;
            }
        }
        // Solo lobbies start without a countdown
        if session.players_max != 1 {
            options.start_delay = 3.0;
        }
        options
    }
}
