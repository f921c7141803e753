mod config;
mod connection;
mod dispatcher;
mod dom;
mod messages;
mod pronouns;
mod render;
mod server;

use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::sync::{watch, Mutex};

use config::OverlayConfig;
use connection::{ConnectionManager, FixedDelay, TungsteniteTransport};
use dispatcher::Dispatcher;
use pronouns::{HttpPronounService, PronounCache};
use render::Overlay;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = OverlayConfig::parse();
    info!("Starting chat overlay for {}", config.endpoint);

    let overlay = Arc::new(Mutex::new(Overlay::new(
        config.viewport(),
        config.render_options(),
    )));

    let pronouns = if config.pronouns {
        match HttpPronounService::new(&config.pronoun_api) {
            Ok(service) => Some(Arc::new(PronounCache::new(
                Arc::new(service),
                config.pronoun_stale_after(),
            ))),
            Err(e) => {
                error!("Failed to create pronoun client: {e}");
                return;
            }
        }
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let manager = ConnectionManager::new(
        config.endpoint.clone(),
        TungsteniteTransport,
        FixedDelay::new(config.reconnect_delay()),
        Dispatcher::new(overlay.clone(), pronouns),
    );

    let server = match server::serve(
        config.listen,
        overlay,
        manager.subscribe(),
        &config.style(),
        shutdown_rx.clone(),
    ) {
        Ok(server) => tokio::spawn(server),
        Err(e) => {
            error!("Failed to bind {}: {e}", config.listen);
            return;
        }
    };

    let connection = tokio::spawn(manager.run(shutdown_rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
    }
    info!("Shutting down");
    shutdown_tx.send_replace(true);

    let (connection, server) = tokio::join!(connection, server);
    if let Err(e) = connection.and(server) {
        error!("Shutdown did not complete cleanly: {e}");
    }
}
