use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::SignedCookieJar;
use chrono::{DateTime, Utc};
use gatehouse_adapters::config::SESSION_COOKIE;
use gatehouse_application::LogoutUseCase;
use gatehouse_core::User;
use serde::Serialize;

use super::resolve_current;
use crate::cookies;
use crate::error::AuthApiError;
use crate::state::AuthState;

/// User shape exposed over the API. Sealed two-factor material never
/// leaves the store boundary.
#[derive(Debug, Serialize)]
pub struct ApiUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub mobile: Option<String>,
    pub mobile_verified: bool,
    pub avatar_url: Option<String>,
    pub two_factor_enabled: bool,
}

impl From<User> for ApiUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            name: user.name,
            email: user.email,
            email_verified: user.email_verified,
            mobile: user.mobile,
            mobile_verified: user.mobile_verified,
            avatar_url: user.avatar_url,
            two_factor_enabled: user.two_factor_enabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: ApiUser,
    pub two_factor_verified: bool,
    pub expires_at: DateTime<Utc>,
}

/// GET /session - the caller's resolved session, or 401.
#[tracing::instrument(name = "Current session", skip_all)]
pub async fn current_session(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
) -> Result<Json<SessionResponse>, AuthApiError> {
    let current = resolve_current(&state, &jar)
        .await
        .ok_or(AuthApiError::Unauthorized)?;

    Ok(Json(SessionResponse {
        two_factor_verified: current.session.two_factor_verified,
        expires_at: current.session.expires_at,
        user: current.user.into(),
    }))
}

/// POST /logout - invalidate the session and clear its cookie.
#[tracing::instrument(name = "Logout", skip_all)]
pub async fn logout(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, StatusCode), AuthApiError> {
    if let Some(current) = resolve_current(&state, &jar).await {
        LogoutUseCase::new(state.sessions.clone())
            .execute(&current.session.id)
            .await
            .map_err(|e| AuthApiError::UnexpectedError(e.to_string()))?;
    }

    let jar = jar.remove(cookies::removal_cookie(SESSION_COOKIE, state.secure_cookies));
    Ok((jar, StatusCode::NO_CONTENT))
}
