//! Relay failure kinds.
//!
//! None of these are fatal: the live path logs and drops, the REST path
//! turns them into status codes (see `api`).

use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Bad, missing, or expired credential.
    #[error("authentication error: {0}")]
    Authentication(#[source] eventhub_core::Error),

    /// Malformed chat payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller lacks the role an operation requires.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Message store write (or read) failed.
    #[error("persistence error: {0}")]
    Persistence(#[source] StoreError),

    /// Directory lookup failed.
    #[error("lookup error: {0}")]
    Lookup(#[source] StoreError),
}

impl From<eventhub_core::Error> for RelayError {
    fn from(err: eventhub_core::Error) -> Self {
        if err.is_authentication() {
            RelayError::Authentication(err)
        } else {
            RelayError::Validation(err.to_string())
        }
    }
}
