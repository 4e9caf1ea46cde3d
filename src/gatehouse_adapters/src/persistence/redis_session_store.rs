use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatehouse_core::{
    Session, SessionId, SessionStore, SessionStoreError, SessionToken, UserId,
};
use redis::{Commands, Connection};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::SESSION_KEY_PREFIX;

/// Wire shape of a cached session: snake_case JSON with unix-second expiry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    id: String,
    user_id: String,
    two_factor_verified: bool,
    expires_at: i64,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.as_str().to_string(),
            user_id: session.user_id.as_str().to_string(),
            two_factor_verified: session.two_factor_verified,
            expires_at: session.expires_at.timestamp(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            id: SessionId::new(stored.id),
            user_id: UserId::new(stored.user_id),
            two_factor_verified: stored.two_factor_verified,
            expires_at: DateTime::from_timestamp(stored.expires_at, 0).unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: Arc<RwLock<Connection>>,
}

impl RedisSessionStore {
    pub fn new(conn: Arc<RwLock<Connection>>) -> Self {
        Self { conn }
    }

    async fn fetch(&self, key: &str) -> Option<Session> {
        let mut conn = self.conn.write().await;
        let raw: Option<String> = match conn.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                // Reads fail open: a degraded cache looks like a miss.
                tracing::warn!(error = %e, "session read failed, treating as miss");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => Some(stored.into()),
            Err(e) => {
                tracing::warn!(error = %e, "discarding corrupt session record");
                let _: Result<(), _> = conn.del(key);
                None
            }
        }
    }

    async fn write(&self, session: &Session, ttl: u64) -> Result<(), SessionStoreError> {
        let payload = serde_json::to_string(&StoredSession::from(session))
            .map_err(|e| SessionStoreError::Cache(e.to_string()))?;
        let mut conn = self.conn.write().await;
        conn.set_ex(get_key(&session.id), payload, ttl)
            .map_err(|e| SessionStoreError::Cache(e.to_string()))
    }

    async fn delete_best_effort(&self, session_id: &SessionId) {
        let mut conn = self.conn.write().await;
        if let Err(e) = conn.del::<_, ()>(get_key(session_id)) {
            tracing::warn!(error = %e, "session delete failed");
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    #[tracing::instrument(name = "Creating session in Redis", skip_all)]
    async fn create_session(
        &self,
        token: &SessionToken,
        user_id: UserId,
    ) -> Result<Session, SessionStoreError> {
        let now = Utc::now();
        let session = Session::new(token, user_id, now);
        self.write(&session, session.ttl_seconds(now)).await?;
        Ok(session)
    }

    #[tracing::instrument(name = "Validating session token", skip_all)]
    async fn validate_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<Session>, SessionStoreError> {
        let session_id = token.session_id();
        let Some(session) = self.fetch(&get_key(&session_id)).await else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            self.delete_best_effort(&session_id).await;
            return Ok(None);
        }

        if session.needs_refresh(now) {
            let refreshed = session.clone().refreshed(now);
            // Renewal is opportunistic; a failed rewrite only means the old
            // expiry stays in force.
            match self.write(&refreshed, refreshed.ttl_seconds(now)).await {
                Ok(()) => return Ok(Some(refreshed)),
                Err(e) => {
                    tracing::warn!(error = %e, "session refresh write failed");
                    return Ok(Some(session));
                }
            }
        }

        Ok(Some(session))
    }

    #[tracing::instrument(name = "Updating session two-factor flag", skip_all)]
    async fn set_two_factor_verified(
        &self,
        session_id: &SessionId,
        verified: bool,
    ) -> Result<Option<Session>, SessionStoreError> {
        let Some(session) = self.fetch(&get_key(session_id)).await else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            self.delete_best_effort(session_id).await;
            return Ok(None);
        }

        let updated = Session {
            two_factor_verified: verified,
            ..session
        };
        // Original expiry preserved; only the flag changes.
        self.write(&updated, updated.ttl_seconds(now)).await?;
        Ok(Some(updated))
    }

    #[tracing::instrument(name = "Invalidating session", skip_all)]
    async fn invalidate_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        self.delete_best_effort(session_id).await;
        Ok(())
    }
}

fn get_key(session_id: &SessionId) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}
