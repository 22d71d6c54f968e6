//! Relay task and WebSocket connection handling.
//!
//! One Tokio task owns the [`Relay`] and applies [`Command`]s in arrival
//! order, each to completion. Socket tasks never touch relay state: they
//! translate frames into commands and drain their own outbox.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use eventhub_core::{ClientEvent, Identity, IdentityVerifier, UserId};

use crate::engine::Relay;
use crate::registry::{self, ConnectionId, Outbox};
use crate::storage::{Directory, MessageStore};

/// Work for the relay task.
#[derive(Debug)]
pub enum Command {
    Connect {
        identity: Identity,
        outbox: Outbox,
        reply: oneshot::Sender<ConnectionId>,
    },
    Event {
        conn: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        conn: ConnectionId,
    },
}

/// Cheap, cloneable mailbox of the relay task.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RelayHandle {
    /// Start the relay task. It stops once every handle is dropped.
    pub fn spawn(relay: Relay) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(relay, rx));
        Self { tx }
    }

    /// Register a connection; `None` if the relay task has stopped.
    pub async fn connect(&self, identity: Identity, outbox: Outbox) -> Option<ConnectionId> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Connect { identity, outbox, reply }).ok()?;
        rx.await.ok()
    }

    pub fn event(&self, conn: ConnectionId, event: ClientEvent) {
        if self.tx.send(Command::Event { conn, event }).is_err() {
            warn!("Relay task gone; dropping event from connection {conn}");
        }
    }

    pub fn disconnect(&self, conn: ConnectionId) {
        let _ = self.tx.send(Command::Disconnect { conn });
    }
}

async fn run(mut relay: Relay, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Connect { identity, outbox, reply } => {
                let conn = relay.connect(identity, outbox);
                if reply.send(conn).is_err() {
                    // Socket went away before learning its id.
                    relay.disconnect(conn);
                }
            }
            Command::Event { conn, event } => relay.handle_event(conn, event),
            Command::Disconnect { conn } => relay.disconnect(conn),
        }
    }
    debug!("Relay task stopped");
}

/// Shared state for HTTP and WebSocket handlers.
pub struct RelayState {
    pub verifier: IdentityVerifier,
    pub store: Arc<dyn MessageStore>,
    pub directory: Arc<dyn Directory>,
    pub relay: RelayHandle,
    /// Conversation partner of every non-admin caller.
    pub default_admin_id: UserId,
}

impl RelayState {
    /// Build the state and start the relay task over the given backends.
    pub fn new(
        verifier: IdentityVerifier,
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn Directory>,
        default_admin_id: UserId,
    ) -> Self {
        let relay = RelayHandle::spawn(Relay::new(store.clone(), directory.clone()));
        Self { verifier, store, directory, relay, default_admin_id }
    }
}

/// Handle a single authenticated WebSocket connection.
pub async fn handle_connection(socket: WebSocket, state: Arc<RelayState>, identity: Identity) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, mut outbox_rx) = registry::outbox();

    let user_id = identity.user_id;
    let Some(conn) = state.relay.connect(identity, outbox).await else {
        error!("Relay unavailable; closing socket for user {user_id}");
        let _ = ws_tx.close().await;
        return;
    };

    // Forward queued server events to this client.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let json = match event.encode() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to encode event for connection {conn}: {e}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Read incoming events from the client.
    let relay = state.relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => match ClientEvent::decode(text.as_str()) {
                    Ok(event) => relay.event(conn, event),
                    Err(e) => warn!("Ignoring unreadable frame on connection {conn}: {e}"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.relay.disconnect(conn);
    info!("Socket closed: connection {conn} (user {user_id})");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use eventhub_core::{ChatPayload, Role, ServerEvent};

    fn identity(user_id: UserId, role: Role) -> Identity {
        Identity { user_id, name: format!("u{user_id}"), role }
    }

    #[tokio::test]
    async fn commands_are_applied_in_order() {
        let db = Arc::new(Storage::open_in_memory().unwrap());
        let handle = RelayHandle::spawn(Relay::new(db.clone(), db.clone()));

        let (admin_tx, mut admin_rx) = registry::outbox();
        handle.connect(identity(1, Role::Admin), admin_tx).await.unwrap();
        let (user_tx, _user_rx) = registry::outbox();
        let user = handle.connect(identity(42, Role::User), user_tx).await.unwrap();

        for i in 0..5 {
            handle.event(
                user,
                ClientEvent::ChatMessage(ChatPayload {
                    sender_id: Some(42),
                    receiver_id: Some(1),
                    message: Some(format!("m{i}")),
                }),
            );
        }

        let mut texts = Vec::new();
        while texts.len() < 5 {
            match admin_rx.recv().await.unwrap() {
                ServerEvent::ChatMessage(m) => texts.push(m.message),
                ServerEvent::UserList(_) => {}
            }
        }
        assert_eq!(texts, ["m0", "m1", "m2", "m3", "m4"]);

        let stored: Vec<_> = db
            .conversation(42, 1, 100)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(stored, texts);
    }

    #[tokio::test]
    async fn disconnect_closes_outbox() {
        let db = Arc::new(Storage::open_in_memory().unwrap());
        let handle = RelayHandle::spawn(Relay::new(db.clone(), db));

        let (tx, mut rx) = registry::outbox();
        let conn = handle.connect(identity(42, Role::User), tx).await.unwrap();
        handle.disconnect(conn);

        // The registry held the only sender; dropping it ends the stream.
        assert!(rx.recv().await.is_none());
    }
}
