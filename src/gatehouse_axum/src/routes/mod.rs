pub mod oauth;
pub mod otp;
pub mod session;
pub mod two_factor;

use axum::{
    Router,
    routing::{get, post},
};
use axum_extra::extract::SignedCookieJar;
use gatehouse_adapters::config::{
    DEFAULT_REDIRECT, ONBOARDING_REDIRECT, REDIRECT_COOKIE, SESSION_COOKIE, TWO_FACTOR_REDIRECT,
};
use gatehouse_application::{AuthenticatedLogin, CurrentSession, ResolveSessionUseCase};
use gatehouse_core::SessionToken;
use serde::Deserialize;

use crate::state::AuthState;

/// All authentication routes, to be nested under the application's router.
pub fn router() -> Router<AuthState> {
    Router::new()
        .route("/otp", post(otp::request_code))
        .route("/otp/verify", post(otp::verify_code))
        .route("/google", get(oauth::google_begin))
        .route("/google/callback", get(oauth::google_callback))
        .route("/linkedin", get(oauth::linkedin_begin))
        .route("/linkedin/callback", get(oauth::linkedin_callback))
        .route(
            "/two-factor/setup",
            get(two_factor::setup_begin).post(two_factor::setup_confirm),
        )
        .route("/two-factor/verify", post(two_factor::verify))
        .route("/two-factor/reset", post(two_factor::reset))
        .route("/session", get(session::current_session))
        .route("/logout", post(session::logout))
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Resolves the caller once per request from the session cookie; handlers
/// receive the result explicitly.
pub(crate) async fn resolve_current(
    state: &AuthState,
    jar: &SignedCookieJar,
) -> Option<CurrentSession> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| SessionToken::new(cookie.value().to_string()));

    ResolveSessionUseCase::new(state.sessions.clone(), state.users.clone())
        .execute(token.as_ref())
        .await
        .ok()
        .flatten()
}

/// Only same-site absolute paths survive; anything else falls back to the
/// default landing page (open-redirect guard).
pub(crate) fn sanitize_redirect(target: Option<String>) -> String {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") => t,
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

/// The stashed redirect target for the running login flow, if any.
pub(crate) fn stashed_redirect(jar: &SignedCookieJar) -> String {
    sanitize_redirect(jar.get(REDIRECT_COOKIE).map(|c| c.value().to_string()))
}

/// Where a successful login lands: the two-factor gate when the user has it
/// enabled, onboarding for first-time users, else the requested target.
pub(crate) fn post_login_redirect(login: &AuthenticatedLogin, redirect_to: &str) -> String {
    if login.user.two_factor_enabled {
        TWO_FACTOR_REDIRECT.to_string()
    } else if login.created {
        ONBOARDING_REDIRECT.to_string()
    } else {
        redirect_to.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_external_and_scheme_relative_targets() {
        assert_eq!(sanitize_redirect(Some("/settings".into())), "/settings");
        assert_eq!(
            sanitize_redirect(Some("https://evil.test".into())),
            DEFAULT_REDIRECT
        );
        assert_eq!(sanitize_redirect(Some("//evil.test".into())), DEFAULT_REDIRECT);
        assert_eq!(sanitize_redirect(None), DEFAULT_REDIRECT);
    }
}
