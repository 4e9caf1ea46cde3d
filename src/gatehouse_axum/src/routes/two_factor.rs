use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::SignedCookieJar;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use gatehouse_application::{
    TwoFactorResetError, TwoFactorResetUseCase, TwoFactorSetupError, TwoFactorSetupUseCase,
    TwoFactorVerifyError, TwoFactorVerifyUseCase,
};
use gatehouse_core::{OtpCode, TwoFactorError};
use serde::{Deserialize, Serialize};

use super::resolve_current;
use crate::error::AuthApiError;
use crate::state::AuthState;

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    /// Base64 of the raw 20-byte key; shown to the user exactly once.
    pub key: String,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct SetupConfirmBody {
    pub key: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetBody {
    pub recovery_code: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub recovery_code: String,
}

fn setup_use_case(
    state: &AuthState,
) -> TwoFactorSetupUseCase<
    std::sync::Arc<dyn gatehouse_core::UserStore>,
    std::sync::Arc<dyn gatehouse_core::SessionStore>,
    std::sync::Arc<dyn gatehouse_core::TwoFactorEngine>,
    std::sync::Arc<dyn gatehouse_core::SecretCipher>,
> {
    TwoFactorSetupUseCase::new(
        state.users.clone(),
        state.sessions.clone(),
        state.totp.clone(),
        state.cipher.clone(),
    )
}

/// GET /two-factor/setup - fresh enrollment key and otpauth URI.
#[tracing::instrument(name = "Begin two-factor setup", skip_all)]
pub async fn setup_begin(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
) -> Result<Json<SetupResponse>, AuthApiError> {
    let current = resolve_current(&state, &jar)
        .await
        .ok_or(AuthApiError::Unauthorized)?;

    let enrollment = setup_use_case(&state)
        .begin(&current.user, &current.session)
        .map_err(map_setup_error)?;

    Ok(Json(SetupResponse {
        key: STANDARD.encode(enrollment.key.as_bytes()),
        uri: enrollment.uri,
    }))
}

/// POST /two-factor/setup - confirm with the first authenticator code.
#[tracing::instrument(name = "Confirm two-factor setup", skip_all)]
pub async fn setup_confirm(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    Json(body): Json<SetupConfirmBody>,
) -> Result<StatusCode, AuthApiError> {
    let current = resolve_current(&state, &jar)
        .await
        .ok_or(AuthApiError::Unauthorized)?;

    let key_bytes = STANDARD
        .decode(&body.key)
        .map_err(|_| AuthApiError::InvalidInput("invalid key".to_string()))?;
    OtpCode::parse(&body.code)
        .map_err(|e| AuthApiError::InvalidInput(e.to_string()))?;

    setup_use_case(&state)
        .confirm(&current.user, &current.session, &key_bytes, &body.code)
        .await
        .map_err(map_setup_error)?;

    Ok(StatusCode::OK)
}

/// POST /two-factor/verify - pass the two-factor gate on a fresh session.
#[tracing::instrument(name = "Verify two-factor code", skip_all)]
pub async fn verify(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    Json(body): Json<VerifyBody>,
) -> Result<StatusCode, AuthApiError> {
    let current = resolve_current(&state, &jar)
        .await
        .ok_or(AuthApiError::Unauthorized)?;

    OtpCode::parse(&body.code)
        .map_err(|e| AuthApiError::InvalidInput(e.to_string()))?;

    TwoFactorVerifyUseCase::new(
        state.sessions.clone(),
        state.totp.clone(),
        state.cipher.clone(),
    )
    .execute(&current.user, &current.session, &body.code)
    .await
    .map_err(map_verify_error)?;

    Ok(StatusCode::OK)
}

/// POST /two-factor/reset - consume the recovery code, disable two-factor,
/// hand out the rotated replacement once.
#[tracing::instrument(name = "Reset two-factor", skip_all)]
pub async fn reset(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
    Json(body): Json<ResetBody>,
) -> Result<Json<ResetResponse>, AuthApiError> {
    let current = resolve_current(&state, &jar)
        .await
        .ok_or(AuthApiError::Unauthorized)?;

    let replacement = TwoFactorResetUseCase::new(state.users.clone(), state.sessions.clone())
        .execute(&current.user.id, &current.session.id, &body.recovery_code)
        .await
        .map_err(map_reset_error)?;

    Ok(Json(ResetResponse {
        recovery_code: replacement.as_str().to_string(),
    }))
}

fn map_two_factor(error: TwoFactorError) -> AuthApiError {
    match error {
        TwoFactorError::InvalidKey | TwoFactorError::InvalidCode
        | TwoFactorError::InvalidRecoveryCode => AuthApiError::InvalidInput(error.to_string()),
        TwoFactorError::ContactUnverified
        | TwoFactorError::AlreadyEnabled
        | TwoFactorError::NotEnabled
        | TwoFactorError::AlreadyVerified => AuthApiError::Forbidden(error.to_string()),
    }
}

fn map_setup_error(error: TwoFactorSetupError) -> AuthApiError {
    match error {
        TwoFactorSetupError::TwoFactor(e) => map_two_factor(e),
        other => AuthApiError::UnexpectedError(other.to_string()),
    }
}

fn map_verify_error(error: TwoFactorVerifyError) -> AuthApiError {
    match error {
        TwoFactorVerifyError::TwoFactor(e) => map_two_factor(e),
        TwoFactorVerifyError::SessionGone => AuthApiError::Unauthorized,
        other => AuthApiError::UnexpectedError(other.to_string()),
    }
}

fn map_reset_error(error: TwoFactorResetError) -> AuthApiError {
    match error {
        TwoFactorResetError::TwoFactor(e) => map_two_factor(e),
        TwoFactorResetError::InvalidRecoveryCode => {
            AuthApiError::InvalidInput("invalid recovery code".to_string())
        }
        other => AuthApiError::UnexpectedError(other.to_string()),
    }
}
