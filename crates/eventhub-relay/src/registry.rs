//! Live connection bookkeeping.
//!
//! Users are reachable through at most one connection (the most recent one
//! wins). Admins may hold any number of connections at once. The registry
//! also owns each connection's outbound mailbox, so nothing else keeps a
//! handle to a socket.

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use eventhub_core::{Identity, Role, ServerEvent, UserId};

/// Opaque handle for one live socket. Never reused within a process.
pub type ConnectionId = u64;

/// Events a connection may have queued before further ones are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// Outbound mailbox drained by the socket task.
pub type Outbox = mpsc::Sender<ServerEvent>;

/// A fresh mailbox pair of [`OUTBOX_CAPACITY`].
pub fn outbox() -> (Outbox, mpsc::Receiver<ServerEvent>) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// A registered connection.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    outbox: Outbox,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
    users: HashMap<UserId, ConnectionId>,
    admins: HashSet<ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an authenticated connection and index it by role.
    pub fn connect(&mut self, identity: Identity, outbox: Outbox) -> ConnectionId {
        self.next_id += 1;
        let id = self.next_id;

        match identity.role {
            Role::Admin => self.register_admin(id),
            Role::User => self.register_user(identity.user_id, id),
        }
        self.connections.insert(id, Connection { id, identity, outbox });
        id
    }

    /// Point `user_id` at `conn`, superseding any earlier connection.
    pub fn register_user(&mut self, user_id: UserId, conn: ConnectionId) {
        if let Some(prev) = self.users.insert(user_id, conn) {
            if prev != conn {
                debug!("User {user_id}: connection {prev} superseded by {conn}");
            }
        }
    }

    pub fn register_admin(&mut self, conn: ConnectionId) {
        self.admins.insert(conn);
    }

    /// Drop the role index entry for `conn`.
    ///
    /// A user mapping is only removed while it still points at `conn`, so a
    /// late unregister of a superseded socket leaves the newer one alone.
    /// Calling this twice is harmless.
    pub fn unregister(&mut self, conn: ConnectionId, role: Role, user_id: UserId) {
        match role {
            Role::Admin => {
                self.admins.remove(&conn);
            }
            Role::User => {
                if self.users.get(&user_id) == Some(&conn) {
                    self.users.remove(&user_id);
                }
            }
        }
    }

    /// Forget a connection entirely. Returns it if it was still known.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&conn)?;
        self.unregister(conn, connection.identity.role, connection.identity.user_id);
        Some(connection)
    }

    pub fn lookup_user(&self, user_id: UserId) -> Option<ConnectionId> {
        self.users.get(&user_id).copied()
    }

    /// Snapshot of every admin connection.
    pub fn all_admin_connections(&self) -> Vec<ConnectionId> {
        self.admins.iter().copied().collect()
    }

    pub fn identity(&self, conn: ConnectionId) -> Option<&Identity> {
        self.connections.get(&conn).map(|c| &c.identity)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue an event for one connection without waiting. Returns false if
    /// the connection is unknown, its socket task has gone away, or its
    /// outbox is full (the event is dropped).
    pub fn send(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        let Some(c) = self.connections.get(&conn) else {
            return false;
        };
        match c.outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbox full for connection {conn} (user {}); dropping event",
                    c.identity.user_id
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
