//! Error types for eventhub-core.

use thiserror::Error;

/// Errors raised while admitting a connection or a chat payload.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication error: no token")]
    MissingToken,

    #[error("authentication error: invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field value: {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl Error {
    /// True for credential failures (connection must be refused).
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::MissingToken | Error::InvalidToken(_))
    }

    /// True for malformed chat payloads.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::MissingField(_) | Error::InvalidField { .. })
    }
}

/// Result type alias for eventhub-core operations.
pub type Result<T> = std::result::Result<T, Error>;
