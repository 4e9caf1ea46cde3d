pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    error::{AuthError, ConflictKind},
    identifier::{Identifier, IdentifierError},
    rate_limit::BucketState,
    session::{Session, SessionId, SessionToken},
    two_factor::{RecoveryCode, TotpKey, TwoFactorError},
    user::{FederatedProvider, IdentityAssertion, NewUser, User, UserError, UserId, UserUpdate},
    verification_code::{OtpCode, OtpCodeError, VerificationCode},
    webauthn::WebauthnCredential,
};

pub use ports::{
    repositories::{
        RateLimitError, RateLimiter, SessionStore, SessionStoreError, UserStore, UserStoreError,
        VerificationCodeStore, VerificationCodeStoreError, WebauthnCredentialStore,
    },
    services::{
        CipherError, EmailClient, OAuthProfile, OAuthProvider, OAuthProviderError, SecretCipher,
        SmsClient, TwoFactorEngine,
    },
};
