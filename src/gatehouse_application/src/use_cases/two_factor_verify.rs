use gatehouse_core::{
    AuthError, CipherError, SecretCipher, Session, SessionStore, SessionStoreError, TotpKey,
    TwoFactorEngine, TwoFactorError, User,
};

/// Error types for the two-factor verification use case
#[derive(Debug, thiserror::Error)]
pub enum TwoFactorVerifyError {
    #[error(transparent)]
    TwoFactor(#[from] TwoFactorError),
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
    #[error("cipher error: {0}")]
    CipherError(#[from] CipherError),
    #[error("session expired")]
    SessionGone,
}

impl From<TwoFactorVerifyError> for AuthError {
    fn from(error: TwoFactorVerifyError) -> Self {
        match error {
            TwoFactorVerifyError::TwoFactor(e) => AuthError::Validation(e.to_string()),
            TwoFactorVerifyError::SessionGone => AuthError::NotFound,
            TwoFactorVerifyError::SessionStoreError(e) => AuthError::Unexpected(e.to_string()),
            TwoFactorVerifyError::CipherError(e) => AuthError::Unexpected(e.to_string()),
        }
    }
}

/// Two-factor verification use case - gates a freshly issued session on a
/// current TOTP code.
pub struct TwoFactorVerifyUseCase<S, E, C>
where
    S: SessionStore,
    E: TwoFactorEngine,
    C: SecretCipher,
{
    session_store: S,
    engine: E,
    cipher: C,
}

impl<S, E, C> TwoFactorVerifyUseCase<S, E, C>
where
    S: SessionStore,
    E: TwoFactorEngine,
    C: SecretCipher,
{
    pub fn new(session_store: S, engine: E, cipher: C) -> Self {
        Self {
            session_store,
            engine,
            cipher,
        }
    }

    /// Execute the two-factor verification use case
    ///
    /// On success the session's two-factor flag is set; on a wrong code
    /// nothing changes (lockout is the outer rate limiter's job).
    #[tracing::instrument(name = "TwoFactorVerifyUseCase::execute", skip_all)]
    pub async fn execute(
        &self,
        user: &User,
        session: &Session,
        code: &str,
    ) -> Result<Session, TwoFactorVerifyError> {
        if !user.has_verified_contact() {
            return Err(TwoFactorError::ContactUnverified.into());
        }
        if session.two_factor_verified {
            return Err(TwoFactorError::AlreadyVerified.into());
        }
        let Some(sealed) = user.two_factor_secret.as_deref() else {
            return Err(TwoFactorError::NotEnabled.into());
        };
        if !user.two_factor_enabled {
            return Err(TwoFactorError::NotEnabled.into());
        }

        let key = TotpKey::from_bytes(&self.cipher.open(sealed)?)?;
        if !self.engine.verify_code(&key, code) {
            return Err(TwoFactorError::InvalidCode.into());
        }

        self.session_store
            .set_two_factor_verified(&session.id, true)
            .await?
            .ok_or(TwoFactorVerifyError::SessionGone)
    }
}
