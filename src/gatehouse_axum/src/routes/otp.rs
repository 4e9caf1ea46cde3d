use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::SignedCookieJar;
use gatehouse_adapters::config::REDIRECT_COOKIE;
use gatehouse_application::{OtpLoginError, OtpLoginUseCase, RequestCodeUseCase};
use gatehouse_core::AuthError;
use serde::{Deserialize, Serialize};

use super::{RedirectQuery, post_login_redirect, resolve_current, sanitize_redirect, stashed_redirect};
use crate::cookies;
use crate::error::AuthApiError;
use crate::state::AuthState;

#[derive(Debug, Deserialize)]
pub struct RequestCodeBody {
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeBody {
    pub identifier: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub redirect_to: String,
}

/// POST /otp - issue and deliver a one-time code.
#[tracing::instrument(name = "Request OTP", skip_all)]
pub async fn request_code(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<RedirectQuery>,
    jar: SignedCookieJar,
    Json(body): Json<RequestCodeBody>,
) -> Result<impl IntoResponse, AuthApiError> {
    let rate_key = crate::extract::ip_rate_key(&headers)
        .ok_or_else(|| AuthApiError::InvalidInput("client address required".to_string()))?;

    RequestCodeUseCase::new(
        state.codes.clone(),
        state.otp_limiter.clone(),
        state.email.clone(),
        state.sms.clone(),
        state.app_name.clone(),
    )
    .execute(&body.identifier, &rate_key)
    .await
    .map_err(|e| AuthApiError::from(AuthError::from(e)))?;

    // Stash where to land after the code is verified.
    let jar = jar.add(cookies::flow_cookie(
        REDIRECT_COOKIE,
        sanitize_redirect(query.redirect_to),
        state.secure_cookies,
    ));

    Ok((jar, StatusCode::OK))
}

/// POST /otp/verify - consume a code, reconcile the proven contact, issue a
/// session.
#[tracing::instrument(name = "Verify OTP", skip_all)]
pub async fn verify_code(
    State(state): State<AuthState>,
    headers: HeaderMap,
    jar: SignedCookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, AuthApiError> {
    let rate_key = crate::extract::ip_rate_key(&headers)
        .ok_or_else(|| AuthApiError::InvalidInput("client address required".to_string()))?;

    let current = resolve_current(&state, &jar).await;

    let login = OtpLoginUseCase::new(
        state.codes.clone(),
        state.users.clone(),
        state.sessions.clone(),
        state.otp_limiter.clone(),
    )
    .execute(
        &body.identifier,
        &body.code,
        current.as_ref().map(|c| &c.user),
        &rate_key,
    )
    .await
    .map_err(|e| match e {
        OtpLoginError::InvalidCode => {
            AuthApiError::InvalidInput("invalid verification code".to_string())
        }
        other => AuthApiError::from(AuthError::from(other)),
    })?;

    let redirect_to = post_login_redirect(&login, &stashed_redirect(&jar));

    let jar = jar
        .add(cookies::session_cookie(
            &login.token,
            login.session.expires_at,
            state.secure_cookies,
        ))
        .add(cookies::preferred_method_cookie("otp", state.secure_cookies))
        .remove(cookies::removal_cookie(REDIRECT_COOKIE, state.secure_cookies));

    Ok((jar, Json(LoginResponse { redirect_to })))
}
