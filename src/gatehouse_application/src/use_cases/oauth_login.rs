use gatehouse_core::{
    AuthError, IdentityAssertion, OAuthProvider, OAuthProviderError, RateLimitError, RateLimiter,
    SessionStore, SessionStoreError, SessionToken, User, UserStore,
};
use rand::RngCore;

use super::AuthenticatedLogin;
use super::reconcile_identity::{ReconcileError, ReconcileIdentityUseCase};

/// Everything the transport layer must stash in short-lived cookies before
/// redirecting to the provider.
#[derive(Debug)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub pkce_verifier: Option<String>,
}

/// Starts an authorization round-trip: a fresh CSRF state, a PKCE verifier
/// when the provider uses one, and the redirect URL.
pub fn begin_authorization<P: OAuthProvider>(provider: &P) -> AuthorizationRequest {
    let state = random_token();
    let pkce_verifier = provider.uses_pkce().then(random_token);
    let url = provider.authorization_url(&state, pkce_verifier.as_deref());
    AuthorizationRequest {
        url,
        state,
        pkce_verifier,
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes).to_lowercase()
}

/// Error types for the OAuth callback use case
#[derive(Debug, thiserror::Error)]
pub enum OAuthLoginError {
    #[error("rate limited, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("state mismatch")]
    InvalidState,
    #[error("provider error: {0}")]
    Provider(#[from] OAuthProviderError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("session store error: {0}")]
    SessionStoreError(#[from] SessionStoreError),
    #[error("rate limiter error: {0}")]
    RateLimitError(#[from] RateLimitError),
}

impl From<OAuthLoginError> for AuthError {
    fn from(error: OAuthLoginError) -> Self {
        match error {
            OAuthLoginError::RateLimited {
                retry_after_seconds,
            } => AuthError::RateLimited {
                retry_after_seconds,
            },
            OAuthLoginError::InvalidState => {
                AuthError::Validation("state mismatch".to_string())
            }
            OAuthLoginError::Provider(e) => AuthError::ExternalProvider(e.to_string()),
            OAuthLoginError::Reconcile(e) => e.into(),
            OAuthLoginError::SessionStoreError(e) => AuthError::Unexpected(e.to_string()),
            OAuthLoginError::RateLimitError(e) => AuthError::Unexpected(e.to_string()),
        }
    }
}

/// OAuth callback use case - verifies the round-trip state, exchanges the
/// authorization code, reconciles the fetched profile and issues a session.
pub struct OAuthCallbackUseCase<P, U, S, R>
where
    P: OAuthProvider,
    U: UserStore + Clone,
    S: SessionStore,
    R: RateLimiter,
{
    provider: P,
    user_store: U,
    session_store: S,
    rate_limiter: R,
}

impl<P, U, S, R> OAuthCallbackUseCase<P, U, S, R>
where
    P: OAuthProvider,
    U: UserStore + Clone,
    S: SessionStore,
    R: RateLimiter,
{
    pub fn new(provider: P, user_store: U, session_store: S, rate_limiter: R) -> Self {
        Self {
            provider,
            user_store,
            session_store,
            rate_limiter,
        }
    }

    /// Execute the OAuth callback use case
    ///
    /// # Arguments
    /// * `code` - Authorization code from the provider redirect
    /// * `state` - State parameter from the provider redirect
    /// * `stored_state` - State previously stashed in the signed cookie
    /// * `pkce_verifier` - Verifier stashed alongside, for PKCE providers
    /// * `current_user` - The signed-in user, when this is a linking flow
    /// * `rate_key` - Subject key for the rate limiter
    #[tracing::instrument(
        name = "OAuthCallbackUseCase::execute",
        skip(self, code, pkce_verifier, current_user)
    )]
    pub async fn execute(
        &self,
        code: &str,
        state: &str,
        stored_state: Option<&str>,
        pkce_verifier: Option<&str>,
        current_user: Option<&User>,
        rate_key: &str,
    ) -> Result<AuthenticatedLogin, OAuthLoginError> {
        if !self.rate_limiter.consume(rate_key, 1).await? {
            return Err(OAuthLoginError::RateLimited {
                retry_after_seconds: self.rate_limiter.refill_interval_seconds(),
            });
        }

        // The state cookie must exist and match exactly; anything else is a
        // forged or replayed callback.
        if stored_state.is_none_or(|stored| stored != state) {
            return Err(OAuthLoginError::InvalidState);
        }

        let access_token = self.provider.exchange_code(code, pkce_verifier).await?;
        let profile = self.provider.fetch_profile(&access_token).await?;

        let assertion = IdentityAssertion::from(profile);
        let reconciled = ReconcileIdentityUseCase::new(self.user_store.clone())
            .execute(assertion, current_user)
            .await?;

        let token = SessionToken::generate();
        let session = self
            .session_store
            .create_session(&token, reconciled.user.id.clone())
            .await?;

        Ok(AuthenticatedLogin {
            token,
            session,
            user: reconciled.user,
            created: reconciled.created,
        })
    }
}
