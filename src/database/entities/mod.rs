pub mod game_sessions;
pub mod player_stats;
pub mod players;
pub mod session_results;

pub type Player = players::Model;
pub type GameSession = game_sessions::Model;
pub type SessionResult = session_results::Model;
pub type PlayerStats = player_stats::Model;
pub use game_sessions::GameMode;
