use gatehouse_core::{
    AuthError, RecoveryCode, SessionId, SessionStore, SessionStoreError, TwoFactorError, UserId,
    UserStore, UserStoreError,
};

/// Error types for the recovery-code reset use case
#[derive(Debug, thiserror::Error)]
pub enum TwoFactorResetError {
    #[error(transparent)]
    TwoFactor(#[from] TwoFactorError),
    #[error("invalid recovery code")]
    InvalidRecoveryCode,
    #[error("user store error: {0}")]
    UserStoreError(UserStoreError),
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
}

impl From<UserStoreError> for TwoFactorResetError {
    fn from(error: UserStoreError) -> Self {
        match error {
            UserStoreError::InvalidRecoveryCode => TwoFactorResetError::InvalidRecoveryCode,
            other => TwoFactorResetError::UserStoreError(other),
        }
    }
}

impl From<TwoFactorResetError> for AuthError {
    fn from(error: TwoFactorResetError) -> Self {
        match error {
            TwoFactorResetError::TwoFactor(e) => AuthError::Validation(e.to_string()),
            TwoFactorResetError::InvalidRecoveryCode => {
                AuthError::Validation("invalid recovery code".to_string())
            }
            TwoFactorResetError::UserStoreError(e) => AuthError::Unexpected(e.to_string()),
            TwoFactorResetError::SessionStoreError(e) => AuthError::Unexpected(e.to_string()),
        }
    }
}

/// Recovery-code reset use case - disables two-factor with the single-use
/// recovery code and hands out the rotated replacement exactly once.
pub struct TwoFactorResetUseCase<U, S>
where
    U: UserStore,
    S: SessionStore,
{
    user_store: U,
    session_store: S,
}

impl<U, S> TwoFactorResetUseCase<U, S>
where
    U: UserStore,
    S: SessionStore,
{
    pub fn new(user_store: U, session_store: S) -> Self {
        Self {
            user_store,
            session_store,
        }
    }

    /// Execute the reset use case
    ///
    /// The store performs the compare-and-rotate under a row lock, so two
    /// concurrent resets with the same code cannot both succeed. The current
    /// session drops back to unverified.
    #[tracing::instrument(name = "TwoFactorResetUseCase::execute", skip(self, raw_code))]
    pub async fn execute(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        raw_code: &str,
    ) -> Result<RecoveryCode, TwoFactorResetError> {
        let submitted = RecoveryCode::parse(raw_code)?;

        let replacement = self
            .user_store
            .reset_two_factor_with_recovery_code(user_id, &submitted)
            .await?;

        self.session_store
            .set_two_factor_verified(session_id, false)
            .await?;

        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatehouse_adapters::persistence::{HashMapSessionStore, HashMapUserStore};
    use gatehouse_adapters::two_factor::ChaChaSecretCipher;
    use gatehouse_core::{
        IdentityAssertion, NewUser, SecretCipher, Session, SessionToken, TotpKey, User, UserUpdate,
    };

    use super::*;

    async fn fixture() -> (
        TwoFactorResetUseCase<HashMapUserStore, HashMapSessionStore>,
        HashMapUserStore,
        HashMapSessionStore,
        User,
        Session,
        RecoveryCode,
    ) {
        let cipher = ChaChaSecretCipher::new(&[5u8; 32]);
        let user_store = HashMapUserStore::new(Arc::new(cipher.clone()));
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

        // Enable two-factor and pin a known recovery code.
        let sealed_secret = cipher.seal(TotpKey::generate().as_bytes()).unwrap();
        let user = user_store
            .update_user(
                &user.id,
                UserUpdate {
                    two_factor_enabled: Some(true),
                    two_factor_secret: Some(sealed_secret),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        let recovery = RecoveryCode::generate();
        user_store
            .set_recovery_code_for_tests(&user.id, &recovery)
            .await;

        let session = session_store
            .create_session(&SessionToken::generate(), user.id.clone())
            .await
            .unwrap();
        let session = session_store
            .set_two_factor_verified(&session.id, true)
            .await
            .unwrap()
            .unwrap();

        let use_case = TwoFactorResetUseCase::new(user_store.clone(), session_store.clone());
        (use_case, user_store, session_store, user, session, recovery)
    }

    #[tokio::test]
    async fn reset_disables_two_factor_and_rotates_the_code() {
        let (use_case, store, _sessions, user, session, recovery) = fixture().await;

        let replacement = use_case
            .execute(&user.id, &session.id, recovery.as_str())
            .await
            .unwrap();

        assert_ne!(replacement, recovery);

        let stored = store.get_user(&user.id).await.unwrap().unwrap();
        assert!(!stored.two_factor_enabled);
        assert_eq!(stored.two_factor_secret, None);
    }

    #[tokio::test]
    async fn used_code_cannot_be_used_twice() {
        let (use_case, _store, _sessions, user, session, recovery) = fixture().await;

        use_case
            .execute(&user.id, &session.id, recovery.as_str())
            .await
            .unwrap();
        let second = use_case
            .execute(&user.id, &session.id, recovery.as_str())
            .await;

        assert!(matches!(
            second,
            Err(TwoFactorResetError::InvalidRecoveryCode)
        ));
    }

    #[tokio::test]
    async fn malformed_code_is_rejected_before_any_store_access() {
        let (use_case, store, _sessions, user, session, _recovery) = fixture().await;
        let writes = store.write_count();

        let result = use_case.execute(&user.id, &session.id, "short").await;
        assert!(matches!(
            result,
            Err(TwoFactorResetError::TwoFactor(
                TwoFactorError::InvalidRecoveryCode
            ))
        ));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn session_drops_back_to_unverified() {
        let (use_case, _store, sessions, user, session, recovery) = fixture().await;
        assert!(session.two_factor_verified);

        use_case
            .execute(&user.id, &session.id, recovery.as_str())
            .await
            .unwrap();

        let after = sessions.stored_session(&session.id).await.unwrap();
        assert!(!after.two_factor_verified);
    }
}
