//! Server configuration loading. The configuration is read from the
//! `TA_CONFIG_JSON` environment variable if present, otherwise from a
//! `config.json` file next to the binary, otherwise defaults are used.

use log::LevelFilter;
use serde::Deserialize;
use std::{env, fs::read_to_string, net::IpAddr, path::Path};

/// The server version extracted from the Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from
const CONFIG_ENV_KEY: &str = "TA_CONFIG_JSON";

pub fn load_config() -> Option<Config> {
    // Attempt to load the config from the env
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        let config: Config = match serde_json::from_str(&env) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("Failed to load env config (Using default): {:?}", err);
                return None;
            }
        };
        return Some(config);
    }

    // Attempt to load the config from disk
    let file = Path::new("config.json");
    if !file.exists() {
        return None;
    }

    let data = match read_to_string(file) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using defaults): {:?}", err);
            return None;
        }
    };

    let config: Config = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using default): {:?}", err);
            return None;
        }
    };

    Some(config)
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind the server socket on
    pub host: IpAddr,
    /// Port to bind the server socket on
    pub port: u16,
    /// Level filter applied to the server logger
    pub logging: LevelFilter,
    /// Path of the SQLite database file
    pub database_file: String,
    /// Seconds between host tick broadcasts
    pub tick_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8000,
            logging: LevelFilter::Info,
            database_file: "data/app.db".to_string(),
            tick_interval: 1,
        }
    }
}
