use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
};
use axum_extra::extract::SignedCookieJar;
use gatehouse_adapters::config::{
    LOGIN_REDIRECT, OAUTH_GOOGLE_STATE_COOKIE, OAUTH_GOOGLE_VERIFIER_COOKIE,
    OAUTH_LINKEDIN_STATE_COOKIE, REDIRECT_COOKIE,
};
use gatehouse_application::{OAuthCallbackUseCase, OAuthLoginError, ReconcileError, begin_authorization};
use gatehouse_core::{OAuthProvider, RateLimiter};
use serde::Deserialize;

use super::{RedirectQuery, post_login_redirect, resolve_current, sanitize_redirect, stashed_redirect};
use crate::cookies;
use crate::error::AuthApiError;
use crate::state::AuthState;

// Error codes surfaced to the login page. Generic by design.
const ERROR_AUTH_CODE: &str = "AUTH_CODE_ERROR";
const ERROR_INVALID_STATE: &str = "INVALID_STATE";
const ERROR_ALREADY_LINKED: &str = "IDENTITY_ALREADY_LINKED";
const ERROR_RATE_LIMITED: &str = "RATE_LIMITED";

/// Per-provider wiring for the shared begin/callback flow.
struct ProviderFlow {
    provider: Arc<dyn OAuthProvider>,
    limiter: Arc<dyn RateLimiter>,
    state_cookie: &'static str,
    verifier_cookie: Option<&'static str>,
    method: &'static str,
}

fn google_flow(state: &AuthState) -> Option<ProviderFlow> {
    Some(ProviderFlow {
        provider: state.google.clone()?,
        limiter: state.google_limiter.clone(),
        state_cookie: OAUTH_GOOGLE_STATE_COOKIE,
        verifier_cookie: Some(OAUTH_GOOGLE_VERIFIER_COOKIE),
        method: "google",
    })
}

fn linkedin_flow(state: &AuthState) -> Option<ProviderFlow> {
    Some(ProviderFlow {
        provider: state.linkedin.clone()?,
        limiter: state.linkedin_limiter.clone(),
        state_cookie: OAUTH_LINKEDIN_STATE_COOKIE,
        verifier_cookie: None,
        method: "linkedin",
    })
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// GET /google - redirect to the provider with fresh state and PKCE.
#[tracing::instrument(name = "Begin Google OAuth", skip_all)]
pub async fn google_begin(
    State(state): State<AuthState>,
    Query(query): Query<RedirectQuery>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), AuthApiError> {
    let flow = google_flow(&state).ok_or(AuthApiError::NotFound)?;
    begin(state, flow, query, jar)
}

/// GET /linkedin - redirect to the provider with fresh state.
#[tracing::instrument(name = "Begin LinkedIn OAuth", skip_all)]
pub async fn linkedin_begin(
    State(state): State<AuthState>,
    Query(query): Query<RedirectQuery>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), AuthApiError> {
    let flow = linkedin_flow(&state).ok_or(AuthApiError::NotFound)?;
    begin(state, flow, query, jar)
}

fn begin(
    state: AuthState,
    flow: ProviderFlow,
    query: RedirectQuery,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), AuthApiError> {
    let request = begin_authorization(&flow.provider);

    let mut jar = jar
        .add(cookies::flow_cookie(
            REDIRECT_COOKIE,
            sanitize_redirect(query.redirect_to),
            state.secure_cookies,
        ))
        .add(cookies::flow_cookie(
            flow.state_cookie,
            request.state,
            state.secure_cookies,
        ));
    if let (Some(name), Some(verifier)) = (flow.verifier_cookie, request.pkce_verifier) {
        jar = jar.add(cookies::flow_cookie(name, verifier, state.secure_cookies));
    }

    Ok((jar, Redirect::to(&request.url)))
}

/// GET /google/callback
#[tracing::instrument(name = "Google OAuth callback", skip_all)]
pub async fn google_callback(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    match google_flow(&state) {
        Some(flow) => callback(state, flow, headers, query, jar).await,
        None => (jar, login_error_redirect(ERROR_AUTH_CODE)),
    }
}

/// GET /linkedin/callback
#[tracing::instrument(name = "LinkedIn OAuth callback", skip_all)]
pub async fn linkedin_callback(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    match linkedin_flow(&state) {
        Some(flow) => callback(state, flow, headers, query, jar).await,
        None => (jar, login_error_redirect(ERROR_AUTH_CODE)),
    }
}

/// Browser-facing: every failure lands back on the login page with a
/// generic error code, never an error body.
async fn callback(
    state: AuthState,
    flow: ProviderFlow,
    headers: HeaderMap,
    query: CallbackQuery,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    let redirect_to = stashed_redirect(&jar);

    let stored_state = jar.get(flow.state_cookie).map(|c| c.value().to_string());
    let pkce_verifier = flow
        .verifier_cookie
        .and_then(|name| jar.get(name))
        .map(|c| c.value().to_string());

    // Flow cookies are one-shot regardless of the outcome.
    let mut jar = jar
        .remove(cookies::removal_cookie(REDIRECT_COOKIE, state.secure_cookies))
        .remove(cookies::removal_cookie(flow.state_cookie, state.secure_cookies));
    if let Some(name) = flow.verifier_cookie {
        jar = jar.remove(cookies::removal_cookie(name, state.secure_cookies));
    }

    let Some(rate_key) = crate::extract::ip_rate_key(&headers) else {
        return (jar, login_error_redirect(ERROR_AUTH_CODE));
    };
    let (Some(code), Some(callback_state)) = (query.code, query.state) else {
        return (jar, login_error_redirect(ERROR_AUTH_CODE));
    };

    let current = resolve_current(&state, &jar).await;

    let result = OAuthCallbackUseCase::new(
        flow.provider.clone(),
        state.users.clone(),
        state.sessions.clone(),
        flow.limiter.clone(),
    )
    .execute(
        &code,
        &callback_state,
        stored_state.as_deref(),
        pkce_verifier.as_deref(),
        current.as_ref().map(|c| &c.user),
        &rate_key,
    )
    .await;

    match result {
        Ok(login) => {
            let target = post_login_redirect(&login, &redirect_to);
            let jar = jar
                .add(cookies::session_cookie(
                    &login.token,
                    login.session.expires_at,
                    state.secure_cookies,
                ))
                .add(cookies::preferred_method_cookie(
                    flow.method,
                    state.secure_cookies,
                ));
            (jar, Redirect::to(&target))
        }
        Err(error) => {
            tracing::warn!(error = %error, "oauth callback failed");
            let code = match error {
                OAuthLoginError::InvalidState => ERROR_INVALID_STATE,
                OAuthLoginError::Reconcile(ReconcileError::IdentityAlreadyLinked) => {
                    ERROR_ALREADY_LINKED
                }
                OAuthLoginError::RateLimited { .. } => ERROR_RATE_LIMITED,
                _ => ERROR_AUTH_CODE,
            };
            (jar, login_error_redirect(code))
        }
    }
}

fn login_error_redirect(code: &str) -> Redirect {
    Redirect::to(&format!("{LOGIN_REDIRECT}?error={code}"))
}
