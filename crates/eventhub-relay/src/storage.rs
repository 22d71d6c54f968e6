//! SQLite persistence for chat messages and the user directory.
//!
//! The relay only appends to `chat_messages` and only reads `users`; the
//! user table is owned by the account service sharing this database.
//! Everything goes through the [`MessageStore`] and [`Directory`] traits so
//! the relay can run against other backends (and failing fakes in tests).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::info;

use eventhub_core::{ChatMessage, NewChatMessage, RosterEntry, UserId};

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("timestamp out of range: {0}")]
    BadTimestamp(DateTime<Utc>),

    #[error("failed to encode query parameter: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable, append-only chat history.
pub trait MessageStore: Send + Sync {
    /// Persist a message stamped with the current time.
    fn append(&self, msg: NewChatMessage) -> Result<ChatMessage, StoreError>;

    /// The most recent `limit` messages exchanged between `a` and `b`,
    /// oldest first.
    fn conversation(&self, a: UserId, b: UserId, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;

    /// Every user `user` has sent to or received from.
    fn partners_of(&self, user: UserId) -> Result<Vec<UserId>, StoreError>;
}

/// Id → display name lookup.
pub trait Directory: Send + Sync {
    /// Resolve the given ids in one batch. Unknown ids are left out.
    fn resolve(&self, ids: &[UserId]) -> Result<Vec<RosterEntry>, StoreError>;
}

/// Persistent storage backed by SQLite.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL lets the account service read while we append.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let storage = Self::init(conn)?;
        info!("Database opened: {}", path.display());
        Ok(storage)
    }

    /// Fresh private database, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id   INTEGER NOT NULL,
                receiver_id INTEGER NOT NULL,
                message     TEXT NOT NULL,
                timestamp   INTEGER NOT NULL  -- unix nanoseconds
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_pair
                ON chat_messages(sender_id, receiver_id, timestamp);

            CREATE INDEX IF NOT EXISTS idx_chat_messages_receiver
                ON chat_messages(receiver_id);

            CREATE TABLE IF NOT EXISTS users (
                id    INTEGER PRIMARY KEY,
                name  TEXT NOT NULL,
                role  TEXT NOT NULL DEFAULT 'user'
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or rename a directory entry.
    #[cfg(test)]
    pub(crate) fn upsert_user(
        &self,
        id: UserId,
        name: &str,
        role: eventhub_core::Role,
    ) -> Result<(), StoreError> {
        let role = if role.is_admin() { "admin" } else { "user" };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, name, role) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = ?2, role = ?3",
            params![id, name, role],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn message_count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?)
    }
}

impl MessageStore for Storage {
    fn append(&self, msg: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let timestamp = Utc::now();
        let nanos = timestamp
            .timestamp_nanos_opt()
            .ok_or(StoreError::BadTimestamp(timestamp))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO chat_messages (sender_id, receiver_id, message, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![msg.sender_id, msg.receiver_id, msg.message, nanos],
        )?;
        Ok(msg.into_stored(conn.last_insert_rowid(), timestamp))
    }

    fn conversation(&self, a: UserId, b: UserId, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, message, timestamp FROM (
                SELECT * FROM chat_messages
                WHERE (sender_id = ?1 AND receiver_id = ?2)
                   OR (sender_id = ?2 AND receiver_id = ?1)
                ORDER BY timestamp DESC, id DESC
                LIMIT ?3
            ) sub ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![a, b, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, UserId>(1)?,
                row.get::<_, UserId>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, sender_id, receiver_id, message, nanos) = row?;
            messages.push(ChatMessage {
                id,
                sender_id,
                receiver_id,
                message,
                timestamp: DateTime::from_timestamp_nanos(nanos),
            });
        }
        Ok(messages)
    }

    fn partners_of(&self, user: UserId) -> Result<Vec<UserId>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS partner
             FROM chat_messages
             WHERE sender_id = ?1 OR receiver_id = ?1
             ORDER BY partner",
        )?;
        let ids = stmt
            .query_map(params![user], |row| row.get(0))?
            .collect::<Result<Vec<UserId>, _>>()?;
        Ok(ids)
    }
}

impl Directory for Storage {
    fn resolve(&self, ids: &[UserId]) -> Result<Vec<RosterEntry>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // One JSON array parameter, however many ids.
        let ids = serde_json::to_string(ids)?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name FROM users
             WHERE id IN (SELECT value FROM json_each(?1))
             ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![ids], |row| {
                Ok(RosterEntry { id: row.get(0)?, name: row.get(1)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
