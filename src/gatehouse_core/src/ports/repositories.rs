use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    identifier::Identifier,
    session::{Session, SessionId, SessionToken},
    two_factor::RecoveryCode,
    user::{FederatedProvider, NewUser, User, UserId, UserUpdate},
    verification_code::{OtpCode, VerificationCode},
    webauthn::WebauthnCredential,
};

// SessionStore port trait and errors
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("cache error: {0}")]
    Cache(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issues a session for `user_id` keyed by the hash of `token`. The
    /// two-factor flag starts unset and the expiry is 30 days out.
    async fn create_session(
        &self,
        token: &SessionToken,
        user_id: UserId,
    ) -> Result<Session, SessionStoreError>;

    /// Resolves a raw token. Expired sessions are deleted and reported as
    /// `None`; sessions inside the refresh window are re-issued with a full
    /// lifetime before being returned.
    async fn validate_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<Session>, SessionStoreError>;

    /// Flips the two-factor flag, preserving the original expiry. Returns
    /// `None` when the session is gone or expired.
    async fn set_two_factor_verified(
        &self,
        session_id: &SessionId,
        verified: bool,
    ) -> Result<Option<Session>, SessionStoreError>;

    async fn invalidate_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError>;
}

// VerificationCodeStore port trait and errors
#[derive(Debug, Error)]
pub enum VerificationCodeStoreError {
    #[error("cache error: {0}")]
    Cache(String),
}

#[async_trait]
pub trait VerificationCodeStore: Send + Sync {
    /// Invalidates any live code for `identifier` and issues a fresh one.
    async fn request_code(
        &self,
        identifier: &Identifier,
    ) -> Result<VerificationCode, VerificationCodeStoreError>;

    /// Single-use validation: a match consumes the stored code; a mismatch
    /// burns one attempt from its bounded guess budget.
    async fn validate_code(
        &self,
        identifier: &Identifier,
        code: &OtpCode,
    ) -> Result<Option<VerificationCode>, VerificationCodeStoreError>;

    async fn invalidate_code(
        &self,
        identifier: &Identifier,
    ) -> Result<(), VerificationCodeStoreError>;
}

// RateLimiter port trait and errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("cost {cost} is outside the valid range 1..={max}")]
    InvalidCost { cost: u32, max: u32 },
    #[error("cache error: {0}")]
    Store(String),
}

pub fn check_cost(cost: u32, max: u32) -> Result<(), RateLimitError> {
    if cost == 0 || cost > max {
        return Err(RateLimitError::InvalidCost { cost, max });
    }
    Ok(())
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempts to debit `cost` tokens for `key`. `Ok(false)` means the
    /// bucket is short and nothing was mutated.
    async fn consume(&self, key: &str, cost: u32) -> Result<bool, RateLimitError>;

    /// Read-only balance projection.
    async fn remaining_tokens(&self, key: &str) -> Result<u32, RateLimitError>;

    fn refill_interval_seconds(&self) -> u64;
}

// UserStore port trait and errors
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("user not found")]
    UserNotFound,
    #[error("a user with this identifier already exists")]
    DuplicateIdentifier,
    #[error("invalid recovery code")]
    InvalidRecoveryCode,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl PartialEq for UserStoreError {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::UserNotFound, Self::UserNotFound)
                | (Self::DuplicateIdentifier, Self::DuplicateIdentifier)
                | (Self::InvalidRecoveryCode, Self::InvalidRecoveryCode)
                | (Self::Unexpected(_), Self::Unexpected(_))
        )
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. The store generates and seals the initial
    /// recovery code. A unique-constraint collision (concurrent signup with
    /// the same identifier) surfaces as `DuplicateIdentifier`.
    async fn create_user(&self, user: NewUser) -> Result<User, UserStoreError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, UserStoreError>;

    async fn get_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, UserStoreError>;

    async fn get_user_by_federated_id(
        &self,
        provider: FederatedProvider,
        subject: &str,
    ) -> Result<Option<User>, UserStoreError>;

    async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User, UserStoreError>;

    /// Consumes a recovery code under a row-level exclusive lock: compares
    /// against the sealed stored code, clears the TOTP secret, disables
    /// two-factor and rotates to a fresh sealed code, returning its
    /// plaintext exactly once. Two concurrent resets with the same code can
    /// never both succeed.
    async fn reset_two_factor_with_recovery_code(
        &self,
        id: &UserId,
        submitted: &RecoveryCode,
    ) -> Result<RecoveryCode, UserStoreError>;
}

#[async_trait]
pub trait WebauthnCredentialStore: Send + Sync {
    async fn add_credential(&self, credential: WebauthnCredential) -> Result<(), UserStoreError>;
    async fn list_credentials(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<WebauthnCredential>, UserStoreError>;
    async fn delete_credential(&self, user_id: &UserId, id: &str) -> Result<(), UserStoreError>;
}

// Arc delegation so composed services can hand `Arc<dyn Store>` handles to
// the generic use cases.
#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn create_session(
        &self,
        token: &SessionToken,
        user_id: UserId,
    ) -> Result<Session, SessionStoreError> {
        (**self).create_session(token, user_id).await
    }

    async fn validate_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<Session>, SessionStoreError> {
        (**self).validate_token(token).await
    }

    async fn set_two_factor_verified(
        &self,
        session_id: &SessionId,
        verified: bool,
    ) -> Result<Option<Session>, SessionStoreError> {
        (**self).set_two_factor_verified(session_id, verified).await
    }

    async fn invalidate_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        (**self).invalidate_session(session_id).await
    }
}

#[async_trait]
impl<T: VerificationCodeStore + ?Sized> VerificationCodeStore for Arc<T> {
    async fn request_code(
        &self,
        identifier: &Identifier,
    ) -> Result<VerificationCode, VerificationCodeStoreError> {
        (**self).request_code(identifier).await
    }

    async fn validate_code(
        &self,
        identifier: &Identifier,
        code: &OtpCode,
    ) -> Result<Option<VerificationCode>, VerificationCodeStoreError> {
        (**self).validate_code(identifier, code).await
    }

    async fn invalidate_code(
        &self,
        identifier: &Identifier,
    ) -> Result<(), VerificationCodeStoreError> {
        (**self).invalidate_code(identifier).await
    }
}

#[async_trait]
impl<T: RateLimiter + ?Sized> RateLimiter for Arc<T> {
    async fn consume(&self, key: &str, cost: u32) -> Result<bool, RateLimitError> {
        (**self).consume(key, cost).await
    }

    async fn remaining_tokens(&self, key: &str) -> Result<u32, RateLimitError> {
        (**self).remaining_tokens(key).await
    }

    fn refill_interval_seconds(&self) -> u64 {
        (**self).refill_interval_seconds()
    }
}

#[async_trait]
impl<T: UserStore + ?Sized> UserStore for Arc<T> {
    async fn create_user(&self, user: NewUser) -> Result<User, UserStoreError> {
        (**self).create_user(user).await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, UserStoreError> {
        (**self).get_user(id).await
    }

    async fn get_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, UserStoreError> {
        (**self).get_user_by_identifier(identifier).await
    }

    async fn get_user_by_federated_id(
        &self,
        provider: FederatedProvider,
        subject: &str,
    ) -> Result<Option<User>, UserStoreError> {
        (**self).get_user_by_federated_id(provider, subject).await
    }

    async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User, UserStoreError> {
        (**self).update_user(id, update).await
    }

    async fn reset_two_factor_with_recovery_code(
        &self,
        id: &UserId,
        submitted: &RecoveryCode,
    ) -> Result<RecoveryCode, UserStoreError> {
        (**self)
            .reset_two_factor_with_recovery_code(id, submitted)
            .await
    }
}
