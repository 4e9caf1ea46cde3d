use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use gatehouse_core::{
    EmailClient, OAuthProvider, RateLimiter, SecretCipher, SessionStore, SmsClient,
    TwoFactorEngine, UserStore, VerificationCodeStore,
};

/// Everything the route handlers need, behind trait objects so the
/// composition root decides between Redis/Postgres and the in-memory
/// variants. Constructed once at startup and cloned per request.
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<dyn SessionStore>,
    pub codes: Arc<dyn VerificationCodeStore>,
    pub users: Arc<dyn UserStore>,
    pub otp_limiter: Arc<dyn RateLimiter>,
    pub google_limiter: Arc<dyn RateLimiter>,
    pub linkedin_limiter: Arc<dyn RateLimiter>,
    pub google: Option<Arc<dyn OAuthProvider>>,
    pub linkedin: Option<Arc<dyn OAuthProvider>>,
    pub email: Arc<dyn EmailClient>,
    pub sms: Arc<dyn SmsClient>,
    pub totp: Arc<dyn TwoFactorEngine>,
    pub cipher: Arc<dyn SecretCipher>,
    pub app_name: String,
    pub secure_cookies: bool,
    pub cookie_key: Key,
}

impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Key {
        state.cookie_key.clone()
    }
}
