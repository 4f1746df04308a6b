pub mod game;
pub mod groups;
pub mod ticker;
pub mod tokens;
