pub mod hashing;
pub mod logging;
pub mod types;
