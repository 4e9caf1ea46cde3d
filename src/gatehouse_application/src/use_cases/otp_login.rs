use gatehouse_core::{
    AuthError, Identifier, IdentifierError, IdentityAssertion, OtpCode, OtpCodeError,
    RateLimitError, RateLimiter, Session, SessionStore, SessionStoreError, SessionToken, User,
    UserStore, VerificationCodeStore, VerificationCodeStoreError,
};

use super::AuthenticatedLogin;
use super::reconcile_identity::{ReconcileError, ReconcileIdentityUseCase};

/// Error types for the OTP login use case
#[derive(Debug, thiserror::Error)]
pub enum OtpLoginError {
    #[error("rate limited, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error(transparent)]
    MalformedCode(#[from] OtpCodeError),
    #[error("invalid verification code")]
    InvalidCode,
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("verification code store error: {0}")]
    CodeStoreError(#[from] VerificationCodeStoreError),
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
    #[error("rate limiter error: {0}")]
    RateLimitError(#[from] RateLimitError),
}

impl From<OtpLoginError> for AuthError {
    fn from(error: OtpLoginError) -> Self {
        match error {
            OtpLoginError::RateLimited {
                retry_after_seconds,
            } => AuthError::RateLimited {
                retry_after_seconds,
            },
            OtpLoginError::InvalidIdentifier(e) => AuthError::Validation(e.to_string()),
            OtpLoginError::MalformedCode(e) => AuthError::Validation(e.to_string()),
            OtpLoginError::InvalidCode => AuthError::NotFound,
            OtpLoginError::Reconcile(e) => e.into(),
            OtpLoginError::CodeStoreError(e) => AuthError::Unexpected(e.to_string()),
            OtpLoginError::SessionStoreError(e) => AuthError::Unexpected(e.to_string()),
            OtpLoginError::RateLimitError(e) => AuthError::Unexpected(e.to_string()),
        }
    }
}

/// OTP login use case - validates a one-time code, reconciles the proven
/// contact against the user store and issues a fresh session.
pub struct OtpLoginUseCase<V, U, S, R>
where
    V: VerificationCodeStore,
    U: UserStore + Clone,
    S: SessionStore,
    R: RateLimiter,
{
    code_store: V,
    user_store: U,
    session_store: S,
    rate_limiter: R,
}

impl<V, U, S, R> OtpLoginUseCase<V, U, S, R>
where
    V: VerificationCodeStore,
    U: UserStore + Clone,
    S: SessionStore,
    R: RateLimiter,
{
    pub fn new(code_store: V, user_store: U, session_store: S, rate_limiter: R) -> Self {
        Self {
            code_store,
            user_store,
            session_store,
            rate_limiter,
        }
    }

    /// Execute the OTP login use case
    ///
    /// # Arguments
    /// * `raw_identifier` - Email address or phone number as submitted
    /// * `raw_code` - The 6-digit code as submitted
    /// * `current_user` - The signed-in user, when this is a linking flow
    /// * `rate_key` - Subject key for the rate limiter
    #[tracing::instrument(name = "OtpLoginUseCase::execute", skip(self, current_user))]
    pub async fn execute(
        &self,
        raw_identifier: &str,
        raw_code: &str,
        current_user: Option<&User>,
        rate_key: &str,
    ) -> Result<AuthenticatedLogin, OtpLoginError> {
        if !self.rate_limiter.consume(rate_key, 1).await? {
            return Err(OtpLoginError::RateLimited {
                retry_after_seconds: self.rate_limiter.refill_interval_seconds(),
            });
        }

        // Malformed input is rejected before any store access.
        let identifier = Identifier::parse(raw_identifier)?;
        let code = OtpCode::parse(raw_code)?;

        let Some(verification) = self.code_store.validate_code(&identifier, &code).await? else {
            return Err(OtpLoginError::InvalidCode);
        };

        let assertion = IdentityAssertion::from_verified_contact(&verification.identifier);
        let reconciled = ReconcileIdentityUseCase::new(self.user_store.clone())
            .execute(assertion, current_user)
            .await?;

        let (token, session) = self.issue_session(&reconciled.user).await?;
        Ok(AuthenticatedLogin {
            token,
            session,
            user: reconciled.user,
            created: reconciled.created,
        })
    }

    /// A login always issues a fresh session with the two-factor flag unset,
    /// regardless of the user's enrollment.
    async fn issue_session(&self, user: &User) -> Result<(SessionToken, Session), OtpLoginError> {
        let token = SessionToken::generate();
        let session = self
            .session_store
            .create_session(&token, user.id.clone())
            .await?;
        Ok((token, session))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatehouse_adapters::persistence::{
        HashMapSessionStore, HashMapUserStore, HashMapVerificationCodeStore, InMemoryRateLimiter,
    };
    use gatehouse_adapters::two_factor::ChaChaSecretCipher;

    use super::*;

    type TestUseCase = OtpLoginUseCase<
        HashMapVerificationCodeStore,
        HashMapUserStore,
        HashMapSessionStore,
        InMemoryRateLimiter,
    >;

    fn use_case(max_requests: u32) -> (TestUseCase, HashMapVerificationCodeStore) {
        let code_store = HashMapVerificationCodeStore::new();
        let user_store = HashMapUserStore::new(Arc::new(ChaChaSecretCipher::new(&[7u8; 32])));
        let use_case = OtpLoginUseCase::new(
            code_store.clone(),
            user_store,
            HashMapSessionStore::new(),
            InMemoryRateLimiter::new("otp_login", max_requests, 60),
        );
        (use_case, code_store)
    }

    #[tokio::test]
    async fn first_login_creates_verified_user_with_unverified_session() {
        let (use_case, code_store) = use_case(5);

        let identifier = Identifier::parse("user@test.com").unwrap();
        let issued = code_store.request_code(&identifier).await.unwrap();

        let login = use_case
            .execute("user@test.com", issued.code.as_str(), None, "ip:1.2.3.4")
            .await
            .unwrap();

        assert!(login.created);
        assert_eq!(login.user.email.as_deref(), Some("user@test.com"));
        assert!(login.user.email_verified);
        assert!(!login.session.two_factor_verified);
        assert_eq!(login.session.user_id, login.user.id);
    }

    #[tokio::test]
    async fn code_validates_at_most_once() {
        let (use_case, code_store) = use_case(5);

        let identifier = Identifier::parse("user@test.com").unwrap();
        let issued = code_store.request_code(&identifier).await.unwrap();

        use_case
            .execute("user@test.com", issued.code.as_str(), None, "ip:1.2.3.4")
            .await
            .unwrap();
        let second = use_case
            .execute("user@test.com", issued.code.as_str(), None, "ip:1.2.3.4")
            .await;

        assert!(matches!(second, Err(OtpLoginError::InvalidCode)));
    }

    #[tokio::test]
    async fn returning_user_gets_new_session_not_new_account() {
        let (use_case, code_store) = use_case(5);
        let identifier = Identifier::parse("user@test.com").unwrap();

        let issued = code_store.request_code(&identifier).await.unwrap();
        let first = use_case
            .execute("user@test.com", issued.code.as_str(), None, "ip:1.2.3.4")
            .await
            .unwrap();

        let issued = code_store.request_code(&identifier).await.unwrap();
        let second = use_case
            .execute("user@test.com", issued.code.as_str(), None, "ip:1.2.3.4")
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
        assert_ne!(second.session.id, first.session.id);
    }

    #[tokio::test]
    async fn malformed_code_is_rejected_without_touching_the_stored_code() {
        let (use_case, code_store) = use_case(5);
        let identifier = Identifier::parse("user@test.com").unwrap();
        let issued = code_store.request_code(&identifier).await.unwrap();

        let result = use_case
            .execute("user@test.com", "12345", None, "ip:1.2.3.4")
            .await;
        assert!(matches!(result, Err(OtpLoginError::MalformedCode(_))));

        // The stored code is still consumable.
        let login = use_case
            .execute("user@test.com", issued.code.as_str(), None, "ip:1.2.3.4")
            .await;
        assert!(login.is_ok());
    }

    #[tokio::test]
    async fn guesses_are_rate_limited() {
        let (use_case, _code_store) = use_case(2);

        for _ in 0..2 {
            let _ = use_case
                .execute("user@test.com", "000000", None, "ip:1.2.3.4")
                .await;
        }
        let result = use_case
            .execute("user@test.com", "000000", None, "ip:1.2.3.4")
            .await;
        assert!(matches!(result, Err(OtpLoginError::RateLimited { .. })));
    }
}
