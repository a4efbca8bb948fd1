//! Taskpad record store service — authoritative `tasks` table over
//! WebSocket.
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin taskpad-server
//!
//! # Run on custom address
//! cargo run --bin taskpad-server -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! TASKPAD_SERVER_ADDR=127.0.0.1:8080 cargo run --bin taskpad-server
//! ```

use std::sync::Arc;

use clap::Parser;
use taskpad_server::config::{ServerCliArgs, ServerConfig};
use taskpad_server::server::{self, ServerState};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskpad record store service");

    let state = Arc::new(ServerState::with_config(config.max_label_len));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "record store service listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "record store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start record store service");
            std::process::exit(1);
        }
    }
}
