use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use gatehouse_core::{
    Session, SessionId, SessionStore, SessionStoreError, SessionToken, UserId,
};
use tokio::sync::RwLock;

/// In-memory session store for development and tests. Behaves like the
/// Redis store, including expiry-on-read and sliding refresh.
#[derive(Default, Clone)]
pub struct HashMapSessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl HashMapSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: the raw stored record, bypassing expiry handling.
    pub async fn stored_session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[async_trait::async_trait]
impl SessionStore for HashMapSessionStore {
    async fn create_session(
        &self,
        token: &SessionToken,
        user_id: UserId,
    ) -> Result<Session, SessionStoreError> {
        let session = Session::new(token, user_id, Utc::now());
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn validate_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<Session>, SessionStoreError> {
        let session_id = token.session_id();
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.get(&session_id).cloned() else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            sessions.remove(&session_id);
            return Ok(None);
        }

        if session.needs_refresh(now) {
            let refreshed = session.refreshed(now);
            sessions.insert(session_id, refreshed.clone());
            return Ok(Some(refreshed));
        }

        Ok(Some(session))
    }

    async fn set_two_factor_verified(
        &self,
        session_id: &SessionId,
        verified: bool,
    ) -> Result<Option<Session>, SessionStoreError> {
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.get(session_id).cloned() else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            sessions.remove(session_id);
            return Ok(None);
        }

        let updated = Session {
            two_factor_verified: verified,
            ..session
        };
        sessions.insert(session_id.clone(), updated.clone());
        Ok(Some(updated))
    }

    async fn invalidate_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_validate_roundtrip() {
        let store = HashMapSessionStore::new();
        let token = SessionToken::generate();
        let created = store
            .create_session(&token, UserId::generate())
            .await
            .unwrap();

        let validated = store.validate_token(&token).await.unwrap().unwrap();
        assert_eq!(validated.id, created.id);
        assert!(!validated.two_factor_verified);
    }

    #[tokio::test]
    async fn unknown_token_is_none() {
        let store = HashMapSessionStore::new();
        assert!(
            store
                .validate_token(&SessionToken::generate())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn expired_session_is_deleted_on_validation() {
        let store = HashMapSessionStore::new();
        let token = SessionToken::generate();
        let session = store
            .create_session(&token, UserId::generate())
            .await
            .unwrap();

        // Force the stored record into the past.
        {
            let mut sessions = store.sessions.write().await;
            let stored = sessions.get_mut(&session.id).unwrap();
            stored.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }

        assert!(store.validate_token(&token).await.unwrap().is_none());
        assert!(store.stored_session(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn validation_inside_refresh_window_extends_expiry() {
        let store = HashMapSessionStore::new();
        let token = SessionToken::generate();
        let session = store
            .create_session(&token, UserId::generate())
            .await
            .unwrap();

        // Push the session into the refresh window (16 of 30 days gone).
        {
            let mut sessions = store.sessions.write().await;
            let stored = sessions.get_mut(&session.id).unwrap();
            stored.expires_at = Utc::now() + chrono::Duration::days(14);
        }

        let validated = store.validate_token(&token).await.unwrap().unwrap();
        assert!(validated.expires_at > Utc::now() + chrono::Duration::days(29));
    }

    #[tokio::test]
    async fn two_factor_flag_does_not_touch_expiry() {
        let store = HashMapSessionStore::new();
        let token = SessionToken::generate();
        let session = store
            .create_session(&token, UserId::generate())
            .await
            .unwrap();

        let updated = store
            .set_two_factor_verified(&session.id, true)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.two_factor_verified);
        assert_eq!(updated.expires_at, session.expires_at);
    }
}
