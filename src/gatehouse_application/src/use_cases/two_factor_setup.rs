use gatehouse_core::{
    AuthError, CipherError, SecretCipher, Session, SessionStore, SessionStoreError, TotpKey,
    TwoFactorEngine, TwoFactorError, User, UserStore, UserStoreError, UserUpdate,
};

/// What the client needs to enroll an authenticator: the raw key (displayed
/// once, typically base64) and the otpauth URI for QR rendering.
#[derive(Debug)]
pub struct TwoFactorEnrollment {
    pub key: TotpKey,
    pub uri: String,
}

/// Error types for the two-factor setup use case
#[derive(Debug, thiserror::Error)]
pub enum TwoFactorSetupError {
    #[error(transparent)]
    TwoFactor(#[from] TwoFactorError),
    #[error("user store error: {0}")]
    UserStoreError(#[from] UserStoreError),
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
    #[error("cipher error: {0}")]
    CipherError(#[from] CipherError),
}

impl From<TwoFactorSetupError> for AuthError {
    fn from(error: TwoFactorSetupError) -> Self {
        match error {
            TwoFactorSetupError::TwoFactor(e) => AuthError::Validation(e.to_string()),
            TwoFactorSetupError::UserStoreError(e) => AuthError::Unexpected(e.to_string()),
            TwoFactorSetupError::SessionStoreError(e) => AuthError::Unexpected(e.to_string()),
            TwoFactorSetupError::CipherError(e) => AuthError::Unexpected(e.to_string()),
        }
    }
}

/// Two-factor setup use case - enrollment key generation and confirmation.
pub struct TwoFactorSetupUseCase<U, S, E, C>
where
    U: UserStore,
    S: SessionStore,
    E: TwoFactorEngine,
    C: SecretCipher,
{
    user_store: U,
    session_store: S,
    engine: E,
    cipher: C,
}

impl<U, S, E, C> TwoFactorSetupUseCase<U, S, E, C>
where
    U: UserStore,
    S: SessionStore,
    E: TwoFactorEngine,
    C: SecretCipher,
{
    pub fn new(user_store: U, session_store: S, engine: E, cipher: C) -> Self {
        Self {
            user_store,
            session_store,
            engine,
            cipher,
        }
    }

    /// Starts enrollment: a fresh 20-byte key plus its otpauth URI. The key
    /// is not persisted until [`confirm`](Self::confirm) proves the
    /// authenticator works.
    #[tracing::instrument(name = "TwoFactorSetupUseCase::begin", skip_all)]
    pub fn begin(
        &self,
        user: &User,
        session: &Session,
    ) -> Result<TwoFactorEnrollment, TwoFactorSetupError> {
        self.check_gates(user, session)?;

        let key = self.engine.generate_key();
        let account = user.identifier().unwrap_or(user.id.as_str());
        let uri = self.engine.enrollment_uri(account, &key);
        Ok(TwoFactorEnrollment { key, uri })
    }

    /// Confirms enrollment with the first code from the authenticator, then
    /// seals and persists the key and marks the current session verified.
    #[tracing::instrument(name = "TwoFactorSetupUseCase::confirm", skip_all)]
    pub async fn confirm(
        &self,
        user: &User,
        session: &Session,
        key_bytes: &[u8],
        code: &str,
    ) -> Result<(), TwoFactorSetupError> {
        self.check_gates(user, session)?;

        let key = TotpKey::from_bytes(key_bytes)?;
        if !self.engine.verify_code(&key, code) {
            return Err(TwoFactorError::InvalidCode.into());
        }

        let sealed = self.cipher.seal(key.as_bytes())?;
        let update = UserUpdate {
            two_factor_enabled: Some(true),
            two_factor_secret: Some(sealed),
            ..UserUpdate::default()
        };
        self.user_store.update_user(&user.id, update).await?;
        self.session_store
            .set_two_factor_verified(&session.id, true)
            .await?;
        Ok(())
    }

    /// Enrollment requires every contact channel verified, and re-enrollment
    /// requires a two-factor-verified session.
    fn check_gates(&self, user: &User, session: &Session) -> Result<(), TwoFactorError> {
        if !user.all_contacts_verified() {
            return Err(TwoFactorError::ContactUnverified);
        }
        if user.two_factor_enabled
            && user.two_factor_secret.is_some()
            && !session.two_factor_verified
        {
            return Err(TwoFactorError::AlreadyEnabled);
        }
        Ok(())
    }
}
