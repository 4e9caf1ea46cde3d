use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    two_factor::TotpKey,
    user::{FederatedProvider, IdentityAssertion},
};

// Outbound notification ports. Transports themselves are external
// collaborators; the engine only needs a send seam.
#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_email(&self, recipient: &str, subject: &str, content: &str)
    -> Result<(), String>;
}

#[async_trait]
pub trait SmsClient: Send + Sync {
    async fn send_sms(&self, recipient: &str, body: &str) -> Result<(), String>;
}

// OAuthProvider port trait and errors
#[derive(Debug, Error)]
pub enum OAuthProviderError {
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("profile fetch failed: {0}")]
    Profile(String),
}

/// The profile shape every provider adapter normalizes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: FederatedProvider,
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<OAuthProfile> for IdentityAssertion {
    fn from(profile: OAuthProfile) -> Self {
        Self {
            federated: Some((profile.provider, profile.subject)),
            email_verified: profile.email.is_some() && profile.email_verified,
            email: profile.email,
            mobile: None,
            mobile_verified: false,
            name: profile.name,
            avatar_url: profile.picture,
        }
    }
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn provider(&self) -> FederatedProvider;

    /// Whether this provider requires a PKCE code verifier on top of the
    /// CSRF state.
    fn uses_pkce(&self) -> bool {
        false
    }

    /// Builds the authorization redirect for this provider. Providers using
    /// PKCE receive the verifier alongside the CSRF state.
    fn authorization_url(&self, state: &str, pkce_verifier: Option<&str>) -> String;

    /// Opaque "exchange code for token" call against the provider.
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<String, OAuthProviderError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthProviderError>;
}

// TwoFactorEngine port trait
pub trait TwoFactorEngine: Send + Sync {
    fn generate_key(&self) -> TotpKey;

    /// otpauth:// enrollment URI for authenticator apps.
    fn enrollment_uri(&self, account: &str, key: &TotpKey) -> String;

    /// Validates `code` against the current time window.
    fn verify_code(&self, key: &TotpKey, code: &str) -> bool;
}

// SecretCipher port trait and errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption failed")]
    Seal,
    #[error("decryption failed")]
    Open,
}

/// Seals secrets with the process-wide symmetric key before they are
/// persisted. Sealed values are self-contained opaque strings.
pub trait SecretCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<String, CipherError>;
    fn open(&self, sealed: &str) -> Result<Vec<u8>, CipherError>;
}

#[async_trait]
impl<T: EmailClient + ?Sized> EmailClient for Arc<T> {
    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> Result<(), String> {
        (**self).send_email(recipient, subject, content).await
    }
}

#[async_trait]
impl<T: SmsClient + ?Sized> SmsClient for Arc<T> {
    async fn send_sms(&self, recipient: &str, body: &str) -> Result<(), String> {
        (**self).send_sms(recipient, body).await
    }
}

#[async_trait]
impl<T: OAuthProvider + ?Sized> OAuthProvider for Arc<T> {
    fn provider(&self) -> FederatedProvider {
        (**self).provider()
    }

    fn uses_pkce(&self) -> bool {
        (**self).uses_pkce()
    }

    fn authorization_url(&self, state: &str, pkce_verifier: Option<&str>) -> String {
        (**self).authorization_url(state, pkce_verifier)
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<String, OAuthProviderError> {
        (**self).exchange_code(code, pkce_verifier).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthProviderError> {
        (**self).fetch_profile(access_token).await
    }
}

impl<T: TwoFactorEngine + ?Sized> TwoFactorEngine for Arc<T> {
    fn generate_key(&self) -> TotpKey {
        (**self).generate_key()
    }

    fn enrollment_uri(&self, account: &str, key: &TotpKey) -> String {
        (**self).enrollment_uri(account, key)
    }

    fn verify_code(&self, key: &TotpKey, code: &str) -> bool {
        (**self).verify_code(key, code)
    }
}

impl<T: SecretCipher + ?Sized> SecretCipher for Arc<T> {
    fn seal(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        (**self).seal(plaintext)
    }

    fn open(&self, sealed: &str) -> Result<Vec<u8>, CipherError> {
        (**self).open(sealed)
    }
}
