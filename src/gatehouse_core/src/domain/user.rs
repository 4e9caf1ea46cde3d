use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identifier::Identifier;

const USER_ID_LENGTH: usize = 16;
const USER_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("a user needs at least one of email or mobile")]
    MissingIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..USER_ID_LENGTH)
            .map(|_| USER_ID_CHARSET[rng.random_range(0..USER_ID_CHARSET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Providers we can federate with. The variant doubles as the unique
/// federated-id column selector on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederatedProvider {
    Google,
    Linkedin,
}

impl FederatedProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub mobile: Option<String>,
    pub mobile_verified: bool,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
    pub linkedin_id: Option<String>,
    pub two_factor_enabled: bool,
    /// Sealed TOTP secret; present only while two-factor is enabled.
    pub two_factor_secret: Option<String>,
    /// Sealed single-use recovery code; always present, rotated on use.
    pub two_factor_recovery_code: String,
}

impl User {
    pub fn federated_id(&self, provider: FederatedProvider) -> Option<&str> {
        match provider {
            FederatedProvider::Google => self.google_id.as_deref(),
            FederatedProvider::Linkedin => self.linkedin_id.as_deref(),
        }
    }

    /// The primary contact identifier, email preferred.
    pub fn identifier(&self) -> Result<&str, UserError> {
        self.email
            .as_deref()
            .or(self.mobile.as_deref())
            .ok_or(UserError::MissingIdentifier)
    }

    pub fn has_verified_contact(&self) -> bool {
        self.email_verified || self.mobile_verified
    }

    /// Every contact channel the user carries must be verified before
    /// two-factor enrollment is allowed.
    pub fn all_contacts_verified(&self) -> bool {
        (self.email.is_none() || self.email_verified)
            && (self.mobile.is_none() || self.mobile_verified)
    }

    /// Computes the minimal update for merging a verified identity assertion
    /// into this record. Populated fields are never overwritten by asserted
    /// data; the federation id itself is always asserted. An empty result
    /// means the assertion carries nothing new (reconciliation stays
    /// idempotent without a write).
    pub fn merge_updates(&self, assertion: &IdentityAssertion) -> UserUpdate {
        let mut update = UserUpdate::default();

        if let Some((provider, subject)) = &assertion.federated {
            if self.federated_id(*provider) != Some(subject.as_str()) {
                match provider {
                    FederatedProvider::Google => update.google_id = Some(subject.clone()),
                    FederatedProvider::Linkedin => update.linkedin_id = Some(subject.clone()),
                }
            }
        }

        if let Some(name) = &assertion.name {
            if self.name.is_none() && !name.is_empty() {
                update.name = Some(name.clone());
            }
        }
        if let Some(avatar_url) = &assertion.avatar_url {
            if self.avatar_url.is_none() && !avatar_url.is_empty() {
                update.avatar_url = Some(avatar_url.clone());
            }
        }

        match (&self.email, &assertion.email) {
            (None, Some(incoming)) if !incoming.is_empty() => {
                update.email = Some(incoming.clone());
                if assertion.email_verified {
                    update.email_verified = Some(true);
                }
            }
            (Some(existing), Some(incoming))
                if existing.eq_ignore_ascii_case(incoming)
                    && assertion.email_verified
                    && !self.email_verified =>
            {
                update.email_verified = Some(true);
            }
            _ => {}
        }

        match (&self.mobile, &assertion.mobile) {
            (None, Some(incoming)) if !incoming.is_empty() => {
                update.mobile = Some(incoming.clone());
                if assertion.mobile_verified {
                    update.mobile_verified = Some(true);
                }
            }
            (Some(existing), Some(incoming))
                if existing == incoming && assertion.mobile_verified && !self.mobile_verified =>
            {
                update.mobile_verified = Some(true);
            }
            _ => {}
        }

        update
    }
}

/// Insert shape for the user store. The store seals and attaches the initial
/// recovery code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub mobile: Option<String>,
    pub mobile_verified: bool,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
    pub linkedin_id: Option<String>,
}

impl NewUser {
    pub fn from_assertion(assertion: &IdentityAssertion) -> Result<Self, UserError> {
        if assertion.email.is_none() && assertion.mobile.is_none() {
            return Err(UserError::MissingIdentifier);
        }

        let (google_id, linkedin_id) = match &assertion.federated {
            Some((FederatedProvider::Google, subject)) => (Some(subject.clone()), None),
            Some((FederatedProvider::Linkedin, subject)) => (None, Some(subject.clone())),
            None => (None, None),
        };

        Ok(Self {
            id: UserId::generate(),
            name: assertion.name.clone(),
            email: assertion.email.clone(),
            email_verified: assertion.email_verified,
            mobile: assertion.mobile.clone(),
            mobile_verified: assertion.mobile_verified,
            avatar_url: assertion.avatar_url.clone(),
            google_id,
            linkedin_id,
        })
    }
}

/// Partial update; `None` means "leave untouched".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub mobile: Option<String>,
    pub mobile_verified: Option<bool>,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
    pub linkedin_id: Option<String>,
    pub two_factor_enabled: Option<bool>,
    pub two_factor_secret: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A verified external identity: an OAuth profile, or an OTP-proven contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    pub federated: Option<(FederatedProvider, String)>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub mobile: Option<String>,
    pub mobile_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl IdentityAssertion {
    /// An OTP success proves control of exactly one contact channel.
    pub fn from_verified_contact(identifier: &Identifier) -> Self {
        let (email, mobile) = match identifier {
            Identifier::Email(value) => (Some(value.clone()), None),
            Identifier::Mobile(value) => (None, Some(value.clone())),
        };
        Self {
            federated: None,
            email_verified: email.is_some(),
            mobile_verified: mobile.is_some(),
            email,
            mobile,
            name: None,
            avatar_url: None,
        }
    }
}
