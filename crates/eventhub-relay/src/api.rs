//! HTTP API for chat history.
//!
//! Lets the mobile client load and send messages without a live socket.
//! Every endpoint takes `Authorization: Bearer <token>`.
//!
//! Endpoints (mounted under `/api/livechat`):
//! - GET  /messages?chatWithId=<id> - recent history with one partner
//! - GET  /chat-users               - users an admin has talked to (admin only)
//! - POST /messages                 - store a message (no live delivery)

use axum::{
    Json,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use eventhub_core::{ChatMessage, Identity, NewChatMessage, Role, RosterEntry, UserId};

use crate::error::RelayError;
use crate::relay::RelayState;

/// Maximum messages returned by GET /messages.
pub const HISTORY_LIMIT: usize = 100;

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Forbidden(_) => StatusCode::FORBIDDEN,
            RelayError::Persistence(_) | RelayError::Lookup(_) => {
                error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// The authenticated caller of a REST endpoint.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl FromRequestParts<Arc<RelayState>> for Caller {
    type Rejection = RelayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<RelayState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let identity = state
            .verifier
            .verify(token)
            .map_err(RelayError::Authentication)?;
        Ok(Caller(identity))
    }
}

/// Query params for GET /messages.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub chat_with_id: Option<UserId>,
}

/// Request body for POST /messages.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub receiver_id: Option<UserId>,
    pub message: Option<String>,
}

/// GET /messages - the caller's conversation, oldest first.
///
/// Admins name the user they are talking to; users always talk to the
/// default admin.
pub async fn get_messages(
    State(state): State<Arc<RelayState>>,
    Caller(caller): Caller,
    Query(params): Query<MessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, RelayError> {
    let partner = match caller.role {
        Role::Admin => params.chat_with_id.ok_or_else(|| {
            RelayError::Validation("Admin must specify a userId to chat with.".to_string())
        })?,
        Role::User => state.default_admin_id,
    };

    let messages = state
        .store
        .conversation(caller.user_id, partner, HISTORY_LIMIT)
        .map_err(RelayError::Persistence)?;
    Ok(Json(messages))
}

/// GET /chat-users - everyone the calling admin has exchanged messages with.
pub async fn get_chat_users(
    State(state): State<Arc<RelayState>>,
    Caller(caller): Caller,
) -> Result<Json<Vec<RosterEntry>>, RelayError> {
    if !caller.role.is_admin() {
        return Err(RelayError::Forbidden("Only admins can fetch chat users"));
    }

    let ids = state
        .store
        .partners_of(caller.user_id)
        .map_err(RelayError::Persistence)?;
    if ids.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let users = state.directory.resolve(&ids).map_err(RelayError::Lookup)?;
    Ok(Json(users))
}

/// POST /messages - persist a message from the caller.
pub async fn send_message(
    State(state): State<Arc<RelayState>>,
    Caller(caller): Caller,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), RelayError> {
    let (Some(receiver_id), Some(message)) = (req.receiver_id, req.message) else {
        warn!("Rejected message from user {}: missing fields", caller.user_id);
        return Err(RelayError::Validation("receiverId and message are required.".to_string()));
    };
    let msg = NewChatMessage::new(caller.user_id, receiver_id, message)?;

    let stored = state.store.append(msg).map_err(RelayError::Persistence)?;
    info!(
        "Message {} saved via API: {} -> {}",
        stored.id, stored.sender_id, stored.receiver_id
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MessageStore, Storage};
    use eventhub_core::{Claims, IdentityVerifier};
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &[u8] = b"api-secret";

    fn state() -> (Arc<RelayState>, Arc<Storage>) {
        let db = Arc::new(Storage::open_in_memory().unwrap());
        db.upsert_user(42, "Ana", Role::User).unwrap();
        db.upsert_user(7, "Beni", Role::User).unwrap();
        let state = RelayState::new(IdentityVerifier::new(SECRET), db.clone(), db.clone(), 1);
        (Arc::new(state), db)
    }

    fn caller(user_id: UserId, role: Role) -> Caller {
        Caller(Identity { user_id, name: format!("u{user_id}"), role })
    }

    fn append(db: &Storage, from: UserId, to: UserId, text: &str) {
        db.append(NewChatMessage::new(from, to, text).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn user_history_is_with_default_admin() {
        let (state, db) = state();
        append(&db, 42, 1, "hello");
        append(&db, 1, 42, "hi Ana");
        append(&db, 42, 2, "not this one");

        let Json(messages) = get_messages(
            State(state),
            caller(42, Role::User),
            Query(MessagesQuery { chat_with_id: Some(2) }),
        )
        .await
        .unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, ["hello", "hi Ana"]);
    }

    #[tokio::test]
    async fn admin_history_needs_partner() {
        let (state, db) = state();
        append(&db, 7, 1, "question");

        let err = get_messages(
            State(state.clone()),
            caller(1, Role::Admin),
            Query(MessagesQuery { chat_with_id: None }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));

        let Json(messages) = get_messages(
            State(state),
            caller(1, Role::Admin),
            Query(MessagesQuery { chat_with_id: Some(7) }),
        )
        .await
        .unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn chat_users_are_admin_only_and_resolved() {
        let (state, db) = state();
        append(&db, 42, 1, "a");
        append(&db, 1, 7, "b");

        let err = get_chat_users(State(state.clone()), caller(42, Role::User)).await.unwrap_err();
        assert!(matches!(err, RelayError::Forbidden(_)));

        let Json(users) = get_chat_users(State(state), caller(1, Role::Admin)).await.unwrap();
        assert_eq!(
            users,
            vec![
                RosterEntry { id: 7, name: "Beni".into() },
                RosterEntry { id: 42, name: "Ana".into() },
            ]
        );
    }

    #[tokio::test]
    async fn post_validates_and_persists() {
        let (state, db) = state();

        let missing = SendRequest { receiver_id: Some(1), message: None };
        let err = send_message(State(state.clone()), caller(42, Role::User), Json(missing))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let empty = SendRequest { receiver_id: Some(1), message: Some(String::new()) };
        let err = send_message(State(state.clone()), caller(42, Role::User), Json(empty))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));

        let ok = SendRequest { receiver_id: Some(1), message: Some("hi".into()) };
        let (status, Json(stored)) = send_message(State(state), caller(42, Role::User), Json(ok))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(stored.sender_id, 42);
        assert_eq!(db.message_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn bearer_token_is_required() {
        let (state, _db) = state();
        let token = encode(
            &Header::default(),
            &Claims { user_id: 42, name: "Ana".into(), role: "user".into(), exp: None },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let Caller(identity) = Caller::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(identity.user_id, 42);

        let (mut parts, _) = axum::http::Request::builder().body(()).unwrap().into_parts();
        let err = Caller::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
