//! EventHub live chat relay.
//!
//! Users chat with the support pool over a WebSocket; messages are stored
//! in SQLite and routed by role. The REST API serves history.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod storage;

use axum::{
    Router,
    extract::{Query, State, ws::WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

pub use error::RelayError;
pub use relay::RelayState;

/// Build the HTTP router (WebSocket, REST, health).
pub fn router(state: Arc<RelayState>) -> Router {
    let livechat = Router::new()
        .route("/messages", get(api::get_messages).post(api::send_message))
        .route("/chat-users", get(api::get_chat_users));

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .nest("/api/livechat", livechat)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Query params for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Authenticate, then upgrade. A bad token never reaches the relay.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<RelayState>>,
) -> Response {
    let identity = match state.verifier.verify(params.token.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Refused chat connection: {e}");
            return RelayError::Authentication(e).into_response();
        }
    };
    ws.on_upgrade(move |socket| relay::handle_connection(socket, state, identity))
}
