use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::user::UserId;

pub const SESSION_EXPIRY_DAYS: i64 = 30;
pub const SESSION_REFRESH_THRESHOLD_DAYS: i64 = 15;

const SESSION_TOKEN_BYTES: usize = 20;

/// The raw bearer token handed to the client. Only ever persisted in the
/// session cookie; stores work with the derived [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let encoded = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes);
        Self(encoded.to_lowercase())
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derives the stable session id as lowercase hex SHA-256 of the token,
    /// so neither the cache key nor the persisted record reveals the token.
    pub fn session_id(&self) -> SessionId {
        let digest = Sha256::digest(self.0.as_bytes());
        SessionId(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub two_factor_verified: bool,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session always starts with the two-factor flag unset, even for
    /// users with two-factor enabled.
    pub fn new(token: &SessionToken, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: token.session_id(),
            user_id,
            two_factor_verified: false,
            expires_at: now + Duration::days(SESSION_EXPIRY_DAYS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Sliding expiration: once the session is past the refresh threshold,
    /// a validation rewrites it with a full lifetime again.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::days(SESSION_REFRESH_THRESHOLD_DAYS)
    }

    pub fn refreshed(mut self, now: DateTime<Utc>) -> Self {
        self.expires_at = now + Duration::days(SESSION_EXPIRY_DAYS);
        self
    }

    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}
