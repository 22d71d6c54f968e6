//! EventHub chat relay server.
//!
//! Bridges mobile users and support admins over a WebSocket, persisting
//! every message to SQLite.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use eventhub_core::IdentityVerifier;
use eventhub_relay::{RelayState, config::Config, router, storage::Storage};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let db = Arc::new(Storage::open(&config.database_path)?);

    let state = Arc::new(RelayState::new(
        IdentityVerifier::new(config.jwt_secret.as_bytes()),
        db.clone(),
        db,
        config.default_admin_id,
    ));
    let app = router(state);

    let addr = config.bind_addr;
    info!("EventHub relay {} listening on {addr}", env!("BUILD_VERSION"));
    info!("WebSocket:  ws://{addr}/ws?token=<jwt>");
    info!("Chat API:   http://{addr}/api/livechat/");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
