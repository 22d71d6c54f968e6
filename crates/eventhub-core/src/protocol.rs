//! Chat WebSocket protocol (JSON text frames).
//!
//! Every frame is `{"event": <name>, "data": <payload>}`:
//!
//! | direction       | event         | data                                         |
//! |-----------------|---------------|----------------------------------------------|
//! | client → server | `chatMessage` | `{senderId, receiverId, message}`            |
//! | client → server | `getUserList` | none (admins only)                           |
//! | server → client | `chatMessage` | `{id, senderId, receiverId, message, timestamp}` |
//! | server → client | `userList`    | `[{id, name}, ...]`                          |

use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, ChatPayload, RosterEntry};

/// Events a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chatMessage")]
    ChatMessage(ChatPayload),

    #[serde(rename = "getUserList")]
    GetUserList,
}

/// Events the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "chatMessage")]
    ChatMessage(ChatMessage),

    #[serde(rename = "userList")]
    UserList(Vec<RosterEntry>),
}

impl ClientEvent {
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl ServerEvent {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
