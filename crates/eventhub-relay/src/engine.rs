//! Message routing between users and the admin pool.
//!
//! Every inbound chat message goes Received → Persisted → Routed, or is
//! dropped on the way. Routing depends only on the sender's role:
//!
//! - an admin's message goes to the one connection of `receiverId`, if any;
//! - a user's message goes to every admin connection, whatever
//!   `receiverId` says (it is still persisted with that nominal receiver).
//!
//! Nothing is acknowledged to the sender. [`Relay`] is not thread-safe on
//! purpose: one task owns it and feeds it events one at a time (see
//! `relay::RelayHandle`).

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use eventhub_core::{ChatMessage, ChatPayload, ClientEvent, Identity, Role, ServerEvent};

use crate::error::RelayError;
use crate::presence::Presence;
use crate::registry::{ConnectionId, ConnectionRegistry, Outbox};
use crate::storage::{Directory, MessageStore};

/// Where a persisted message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Admin → user, user online.
    Targeted(ConnectionId),
    /// Admin → user, user offline. Persisted only.
    Offline,
    /// User → admins; number of admin connections reached.
    Broadcast(usize),
}

impl Delivery {
    /// Number of live `chatMessage` emissions.
    pub fn emissions(self) -> usize {
        match self {
            Delivery::Targeted(_) => 1,
            Delivery::Offline => 0,
            Delivery::Broadcast(n) => n,
        }
    }
}

pub struct Relay {
    registry: ConnectionRegistry,
    presence: Presence,
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn Directory>,
}

impl Relay {
    pub fn new(store: Arc<dyn MessageStore>, directory: Arc<dyn Directory>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            presence: Presence::new(),
            store,
            directory,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Register an authenticated connection. Admins get the roster at once.
    pub fn connect(&mut self, identity: Identity, outbox: Outbox) -> ConnectionId {
        let role = identity.role;
        info!("{role:?} connected: {} ({})", identity.name, identity.user_id);

        let conn = self.registry.connect(identity, outbox);
        if role.is_admin() {
            self.on_admin_connect();
        }
        conn
    }

    pub fn disconnect(&mut self, conn: ConnectionId) {
        if let Some(c) = self.registry.disconnect(conn) {
            info!(
                "{:?} disconnected: {} ({}), connection {conn}",
                c.identity.role, c.identity.name, c.identity.user_id
            );
        }
    }

    /// Dispatch one client event, logging whatever goes wrong.
    pub fn handle_event(&mut self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::ChatMessage(payload) => match self.handle_incoming(conn, payload) {
                Ok(delivery) => debug!("Connection {conn}: {delivery:?}"),
                Err(RelayError::Validation(reason)) => {
                    warn!("Dropping chat message from connection {conn}: {reason}");
                }
                Err(e) => error!("Chat message from connection {conn} not delivered: {e}"),
            },
            ClientEvent::GetUserList => self.on_admin_request(conn),
        }
    }

    /// Validate, persist, update presence, route.
    pub fn handle_incoming(
        &mut self,
        conn: ConnectionId,
        payload: ChatPayload,
    ) -> Result<Delivery, RelayError> {
        let sender = self
            .registry
            .identity(conn)
            .cloned()
            .ok_or_else(|| RelayError::Validation(format!("unknown connection {conn}")))?;

        let msg = payload.validate()?;
        if msg.sender_id != sender.user_id {
            return Err(RelayError::Validation(format!(
                "senderId {} does not match authenticated user {}",
                msg.sender_id, sender.user_id
            )));
        }

        let stored = self.store.append(msg).map_err(RelayError::Persistence)?;
        info!(
            "Message {} saved: {} -> {}",
            stored.id, stored.sender_id, stored.receiver_id
        );

        if self.presence.record_sender(&sender) {
            self.presence
                .broadcast_or_log(self.directory.as_ref(), &self.registry);
        }

        Ok(self.route(sender.role, stored))
    }

    fn route(&self, role: Role, msg: ChatMessage) -> Delivery {
        match role {
            Role::Admin => {
                let receiver = msg.receiver_id;
                let target = self
                    .registry
                    .lookup_user(receiver)
                    .filter(|&conn| self.registry.send(conn, ServerEvent::ChatMessage(msg)));
                match target {
                    Some(conn) => {
                        debug!("Admin message delivered to user {receiver}");
                        Delivery::Targeted(conn)
                    }
                    None => {
                        warn!("User {receiver} not connected; message stored only");
                        Delivery::Offline
                    }
                }
            }
            Role::User => {
                let mut reached = 0;
                for admin in self.registry.all_admin_connections() {
                    if self.registry.send(admin, ServerEvent::ChatMessage(msg.clone())) {
                        reached += 1;
                    }
                }
                Delivery::Broadcast(reached)
            }
        }
    }

    pub fn on_admin_connect(&self) {
        self.presence
            .broadcast_or_log(self.directory.as_ref(), &self.registry);
    }

    /// Explicit `getUserList`. Only admins may ask; anyone else is ignored.
    pub fn on_admin_request(&self, conn: ConnectionId) {
        match self.registry.identity(conn) {
            Some(identity) if identity.role.is_admin() => self.on_admin_connect(),
            _ => debug!("Ignoring userList request from connection {conn}"),
        }
    }
}
