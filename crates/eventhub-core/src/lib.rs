//! # eventhub-core
//!
//! Core types for the EventHub live chat:
//! - Connection identities and HS256 credential verification
//! - The immutable chat message model and payload validation
//! - The JSON wire protocol spoken over the chat WebSocket
//!
//! This crate has no network code and no storage code.
//! The relay server builds on it.

pub mod error;
pub mod identity;
pub mod message;
pub mod protocol;

pub use error::{Error, Result};
pub use identity::{Claims, Identity, IdentityVerifier, Role, UserId};
pub use message::{ChatMessage, ChatPayload, NewChatMessage, RosterEntry};
pub use protocol::{ClientEvent, ServerEvent};
