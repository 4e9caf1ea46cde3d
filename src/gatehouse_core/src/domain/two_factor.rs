use rand::RngCore;
use thiserror::Error;

pub const TOTP_KEY_LENGTH: usize = 20;
pub const TOTP_PERIOD_SECONDS: u64 = 30;
pub const TOTP_DIGITS: usize = 6;

const RECOVERY_CODE_BYTES: usize = 10;
pub const RECOVERY_CODE_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TwoFactorError {
    #[error("key must be exactly {TOTP_KEY_LENGTH} bytes")]
    InvalidKey,
    #[error("invalid two-factor code")]
    InvalidCode,
    #[error("invalid recovery code")]
    InvalidRecoveryCode,
    #[error("two-factor authentication is not enabled")]
    NotEnabled,
    #[error("two-factor is already enabled; verify this session first")]
    AlreadyEnabled,
    #[error("session is already two-factor verified")]
    AlreadyVerified,
    #[error("contact channel must be verified first")]
    ContactUnverified,
}

/// Raw TOTP shared secret. Exactly 20 bytes; sealed by the cipher before it
/// ever reaches the user store.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpKey([u8; TOTP_KEY_LENGTH]);

impl TotpKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOTP_KEY_LENGTH];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TwoFactorError> {
        let bytes: [u8; TOTP_KEY_LENGTH] =
            bytes.try_into().map_err(|_| TwoFactorError::InvalidKey)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Keep the secret out of debug output.
impl std::fmt::Debug for TotpKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TotpKey(..)")
    }
}

/// Single-use recovery code: 16 base32 characters from 10 random bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryCode(String);

impl RecoveryCode {
    pub fn generate() -> Self {
        let mut bytes = [0u8; RECOVERY_CODE_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(base32::encode(
            base32::Alphabet::Rfc4648 { padding: false },
            &bytes,
        ))
    }

    pub fn parse(raw: &str) -> Result<Self, TwoFactorError> {
        if raw.len() != RECOVERY_CODE_LENGTH {
            return Err(TwoFactorError::InvalidRecoveryCode);
        }
        Ok(Self(raw.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totp_key_must_be_twenty_bytes() {
        assert!(TotpKey::from_bytes(&[0u8; 20]).is_ok());
        assert_eq!(
            TotpKey::from_bytes(&[0u8; 19]),
            Err(TwoFactorError::InvalidKey)
        );
        assert_eq!(
            TotpKey::from_bytes(&[0u8; 32]),
            Err(TwoFactorError::InvalidKey)
        );
    }

    #[test]
    fn recovery_code_is_sixteen_base32_characters() {
        let code = RecoveryCode::generate();
        assert_eq!(code.as_str().len(), RECOVERY_CODE_LENGTH);
        assert!(
            code.as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
        );
    }

    #[test]
    fn recovery_code_parse_normalizes_case() {
        let parsed = RecoveryCode::parse("abcdefghjkmnpq23").unwrap();
        assert_eq!(parsed.as_str(), "ABCDEFGHJKMNPQ23");
        assert!(RecoveryCode::parse("too-short").is_err());
    }
}
