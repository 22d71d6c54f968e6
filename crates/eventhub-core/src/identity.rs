//! Connection identities.
//!
//! Clients present an HS256 JSON Web Token when they open the chat socket
//! (or call the REST endpoints). Tokens are issued elsewhere; this module
//! only verifies them and turns the claims into an [`Identity`].

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numeric user id, shared with the user directory.
pub type UserId = i64;

/// Chat role. Admins form the support pool; everyone else is a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Map a role claim to a chat role. Only `"admin"` is privileged.
    pub fn from_claim(role: &str) -> Self {
        if role == "admin" { Role::Admin } else { Role::User }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated party behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
}

/// JWT claims as issued by the user service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Expiry (Unix seconds). Enforced when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.user_id,
            role: Role::from_claim(&claims.role),
            name: claims.name,
        }
    }
}

/// Validates connection credentials against the shared signing secret.
#[derive(Clone)]
pub struct IdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Tokens from the user service may omit `exp`.
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a token and return the identity it carries.
    ///
    /// Fails with an authentication error when the token is absent,
    /// malformed, badly signed, or expired. Nothing else is touched.
    pub fn verify(&self, token: Option<&str>) -> Result<Identity> {
        let token = token.filter(|t| !t.is_empty()).ok_or(Error::MissingToken)?;
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims.into())
    }
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier").finish_non_exhaustive()
    }
}
