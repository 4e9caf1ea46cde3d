use gatehouse_core::{
    TotpKey, TwoFactorEngine, TwoFactorError,
    domain::two_factor::{TOTP_DIGITS, TOTP_PERIOD_SECONDS},
};
use totp_rs::{Algorithm, TOTP};

/// RFC 6238 engine: SHA-1, 6 digits, 30-second period, one step of clock
/// skew tolerated either way.
#[derive(Clone)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    fn totp(&self, key: &TotpKey, account: &str) -> Result<TOTP, TwoFactorError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            1,
            TOTP_PERIOD_SECONDS,
            key.as_bytes().to_vec(),
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|_| TwoFactorError::InvalidKey)
    }

    /// The code for the current time window; used by enrollment tests.
    pub fn current_code(&self, key: &TotpKey) -> Result<String, TwoFactorError> {
        self.totp(key, "account")?
            .generate_current()
            .map_err(|_| TwoFactorError::InvalidCode)
    }
}

impl TwoFactorEngine for TotpEngine {
    fn generate_key(&self) -> TotpKey {
        TotpKey::generate()
    }

    fn enrollment_uri(&self, account: &str, key: &TotpKey) -> String {
        match self.totp(key, account) {
            Ok(totp) => totp.get_url(),
            // 20-byte keys from generate_key never fail construction; a bad
            // account label falls back to the bare issuer.
            Err(_) => match self.totp(key, "account") {
                Ok(totp) => totp.get_url(),
                Err(_) => String::new(),
            },
        }
    }

    fn verify_code(&self, key: &TotpKey, code: &str) -> bool {
        self.totp(key, "account")
            .map(|totp| totp.check_current(code).unwrap_or(false))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_code_verifies() {
        let engine = TotpEngine::new("gatehouse".to_string());
        let key = engine.generate_key();

        let code = engine.current_code(&key).unwrap();
        assert_eq!(code.len(), 6);
        assert!(engine.verify_code(&key, &code));
    }

    #[test]
    fn code_for_one_key_fails_for_another() {
        let engine = TotpEngine::new("gatehouse".to_string());
        let key = engine.generate_key();
        let other = engine.generate_key();

        let code = engine.current_code(&key).unwrap();
        assert!(!engine.verify_code(&other, &code));
    }

    #[test]
    fn enrollment_uri_carries_issuer_and_account() {
        let engine = TotpEngine::new("gatehouse".to_string());
        let key = engine.generate_key();

        let uri = engine.enrollment_uri("ada@example.com", &key);
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("gatehouse"));
        assert!(uri.contains("ada%40example.com"));
    }

    #[test]
    fn malformed_codes_never_verify() {
        let engine = TotpEngine::new("gatehouse".to_string());
        let key = engine.generate_key();

        assert!(!engine.verify_code(&key, ""));
        assert!(!engine.verify_code(&key, "abcdef"));
        assert!(!engine.verify_code(&key, "1234567"));
    }
}
