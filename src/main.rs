#![warn(unused_crate_dependencies)]

use crate::config::{load_config, VERSION};
use crate::services::game::registry::ControllerRegistry;
use crate::services::game::words::{LexiconSource, WordSource};
use crate::services::groups::Groups;
use crate::services::tokens::Tokens;
use axum::Extension;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use utils::logging;

mod config;
mod database;
mod middleware;
mod routes;
mod services;
mod socket;
mod utils;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = load_config().unwrap_or_default();

    // Initialize logging
    logging::setup(config.logging);

    // Create the server socket address while the port is still available
    let addr: SocketAddr = SocketAddr::new(config.host, config.port);

    let db = match database::init(&config.database_file).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to initialize database: {err}");
            return;
        }
    };

    let tokens = Arc::new(Tokens::global().await);
    let groups = Arc::new(Groups::default());
    let word_source: Arc<dyn WordSource> = Arc::new(LexiconSource);
    let registry = Arc::new(ControllerRegistry::new(db.clone(), word_source));

    // Start the host tick broadcaster
    tokio::spawn(services::ticker::run(groups.clone(), config.tick_interval));

    // Create the HTTP router
    let router = routes::router()
        // Apply data extensions
        .layer(Extension(db))
        .layer(Extension(tokens))
        .layer(Extension(groups))
        .layer(Extension(registry))
        .into_make_service();

    info!("Starting server on {} (v{})", addr, VERSION);
    logging::log_connection_urls(config.port);

    // Start the TCP listener
    let listener = match TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to bind server on {}: {:?}", addr, err);
            return;
        }
    };

    // Run the HTTP server
    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            _ = signal::ctrl_c().await;
        })
        .await
    {
        error!("Error within HTTP server {:?}", err);
    }
}
