use gatehouse_core::{
    Session, SessionStore, SessionStoreError, SessionToken, User, UserStore, UserStoreError,
};

/// The request-scoped view of "who is calling": resolved once per request by
/// the transport layer and passed explicitly into handlers.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session: Session,
    pub user: User,
}

/// Error types for session resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveSessionError {
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
    #[error("user store error: {0}")]
    UserStoreError(#[from] UserStoreError),
}

/// Session resolution use case - validates the raw cookie token and loads
/// the owning user. Any gap (no token, unknown token, expired session,
/// vanished user) resolves to `None` rather than an error.
pub struct ResolveSessionUseCase<S, U>
where
    S: SessionStore,
    U: UserStore,
{
    session_store: S,
    user_store: U,
}

impl<S, U> ResolveSessionUseCase<S, U>
where
    S: SessionStore,
    U: UserStore,
{
    pub fn new(session_store: S, user_store: U) -> Self {
        Self {
            session_store,
            user_store,
        }
    }

    #[tracing::instrument(name = "ResolveSessionUseCase::execute", skip_all)]
    pub async fn execute(
        &self,
        token: Option<&SessionToken>,
    ) -> Result<Option<CurrentSession>, ResolveSessionError> {
        let Some(token) = token else {
            return Ok(None);
        };

        let Some(session) = self.session_store.validate_token(token).await? else {
            return Ok(None);
        };

        let Some(user) = self.user_store.get_user(&session.user_id).await? else {
            return Ok(None);
        };

        Ok(Some(CurrentSession { session, user }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatehouse_adapters::persistence::{HashMapSessionStore, HashMapUserStore};
    use gatehouse_adapters::two_factor::ChaChaSecretCipher;
    use gatehouse_core::{IdentityAssertion, NewUser};

    use super::*;

    async fn fixture() -> (
        ResolveSessionUseCase<HashMapSessionStore, HashMapUserStore>,
        HashMapSessionStore,
        User,
    ) {
        let user_store = HashMapUserStore::new(Arc::new(ChaChaSecretCipher::new(&[1u8; 32])));
        let session_store = HashMapSessionStore::new();

        let assertion = IdentityAssertion {
            federated: None,
            email: Some("ada@example.com".to_string()),
            email_verified: true,
            mobile: None,
            mobile_verified: false,
            name: None,
            avatar_url: None,
        };
        let user = user_store
            .create_user(NewUser::from_assertion(&assertion).unwrap())
            .await
            .unwrap();

        let use_case = ResolveSessionUseCase::new(session_store.clone(), user_store);
        (use_case, session_store, user)
    }

    #[tokio::test]
    async fn resolves_valid_token_to_session_and_user() {
        let (use_case, sessions, user) = fixture().await;
        let token = SessionToken::generate();
        sessions
            .create_session(&token, user.id.clone())
            .await
            .unwrap();

        let current = use_case.execute(Some(&token)).await.unwrap().unwrap();
        assert_eq!(current.user.id, user.id);
        assert_eq!(current.session.user_id, user.id);
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let (use_case, _sessions, _user) = fixture().await;

        let current = use_case
            .execute(Some(&SessionToken::generate()))
            .await
            .unwrap();
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn missing_token_resolves_to_none() {
        let (use_case, _sessions, _user) = fixture().await;
        assert!(use_case.execute(None).await.unwrap().is_none());
    }
}
