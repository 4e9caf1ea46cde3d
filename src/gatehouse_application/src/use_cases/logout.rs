use gatehouse_core::{SessionId, SessionStore, SessionStoreError};

/// Error types for logout use case
#[derive(Debug, thiserror::Error)]
pub enum LogoutError {
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
}

/// Logout use case - invalidates the current session unconditionally.
pub struct LogoutUseCase<S>
where
    S: SessionStore,
{
    session_store: S,
}

impl<S> LogoutUseCase<S>
where
    S: SessionStore,
{
    pub fn new(session_store: S) -> Self {
        Self { session_store }
    }

    #[tracing::instrument(name = "LogoutUseCase::execute", skip(self))]
    pub async fn execute(&self, session_id: &SessionId) -> Result<(), LogoutError> {
        self.session_store.invalidate_session(session_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_adapters::persistence::HashMapSessionStore;
    use gatehouse_core::{SessionToken, UserId};

    use super::*;

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let store = HashMapSessionStore::new();
        let token = SessionToken::generate();
        let session = store
            .create_session(&token, UserId::generate())
            .await
            .unwrap();

        LogoutUseCase::new(store.clone())
            .execute(&session.id)
            .await
            .unwrap();

        assert!(store.validate_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_of_unknown_session_is_a_no_op() {
        let store = HashMapSessionStore::new();
        let result = LogoutUseCase::new(store)
            .execute(&SessionToken::generate().session_id())
            .await;
        assert!(result.is_ok());
    }
}
