//! The chat message model.
//!
//! A [`ChatMessage`] is created once per accepted send and never mutated.
//! Inbound payloads arrive as [`ChatPayload`] (every field optional, as the
//! client sent it) and become a [`NewChatMessage`] only after validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::UserId;

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Row id assigned by the message store.
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A validated message that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub message: String,
}

impl NewChatMessage {
    pub fn new(sender_id: UserId, receiver_id: UserId, message: impl Into<String>) -> Result<Self> {
        let message = message.into();
        if message.is_empty() {
            return Err(Error::InvalidField {
                field: "message",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self { sender_id, receiver_id, message })
    }

    /// Stamp the message with its creation time.
    pub fn into_stored(self, id: i64, timestamp: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            message: self.message,
            timestamp,
        }
    }
}

/// A `chatMessage` payload exactly as received from a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default)]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatPayload {
    /// Check that every field is present and the text is non-empty.
    pub fn validate(self) -> Result<NewChatMessage> {
        let sender_id = self.sender_id.ok_or(Error::MissingField("senderId"))?;
        let receiver_id = self.receiver_id.ok_or(Error::MissingField("receiverId"))?;
        let message = self.message.ok_or(Error::MissingField("message"))?;
        NewChatMessage::new(sender_id, receiver_id, message)
    }
}

/// One line of the admin-facing roster of active users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: UserId,
    pub name: String,
}
