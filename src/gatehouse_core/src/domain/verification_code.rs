use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identifier::Identifier;

pub const VERIFICATION_CODE_TTL_SECONDS: i64 = 60 * 10;

/// Wrong guesses tolerated before the stored code is discarded. A mismatch
/// below this bound keeps the code alive so a single typo cannot lock the
/// user out of an otherwise valid code.
pub const MAX_CODE_ATTEMPTS: u8 = 5;

const CODE_DIGITS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpCodeError {
    #[error("code must be exactly {CODE_DIGITS} digits")]
    Malformed,
}

/// A 6-digit numeric one-time code, zero-padded, drawn uniformly from the
/// full 000000-999999 range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn generate() -> Self {
        let value: u32 = rand::rng().random_range(0..1_000_000);
        Self(format!("{value:06}"))
    }

    pub fn parse(raw: &str) -> Result<Self, OtpCodeError> {
        if raw.len() != CODE_DIGITS || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpCodeError::Malformed);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub code: OtpCode,
    pub identifier: Identifier,
    pub expires_at: DateTime<Utc>,
    pub attempts: u8,
}

impl VerificationCode {
    pub fn new(identifier: Identifier, now: DateTime<Utc>) -> Self {
        Self {
            code: OtpCode::generate(),
            identifier,
            expires_at: now + Duration::seconds(VERIFICATION_CODE_TTL_SECONDS),
            attempts: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn matches(&self, code: &OtpCode) -> bool {
        &self.code == code
    }

    /// Records a wrong guess. Returns true once the guess budget is used up
    /// and the code must be invalidated.
    pub fn register_failed_attempt(&mut self) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts >= MAX_CODE_ATTEMPTS
    }

    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn generated_code_is_six_digits() {
        for _ in 0..64 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[quickcheck]
    fn parse_accepts_exactly_six_digit_strings(value: u32) -> bool {
        let padded = format!("{:06}", value % 1_000_000);
        OtpCode::parse(&padded).is_ok()
    }

    #[test]
    fn parse_rejects_malformed_codes() {
        assert_eq!(OtpCode::parse("12345"), Err(OtpCodeError::Malformed));
        assert_eq!(OtpCode::parse("1234567"), Err(OtpCodeError::Malformed));
        assert_eq!(OtpCode::parse("12a456"), Err(OtpCodeError::Malformed));
    }

    #[test]
    fn expires_after_ttl() {
        let now = Utc::now();
        let identifier = Identifier::parse("user@test.com").unwrap();
        let code = VerificationCode::new(identifier, now);

        assert!(!code.is_expired(now));
        assert!(code.is_expired(now + Duration::seconds(VERIFICATION_CODE_TTL_SECONDS)));
    }

    #[test]
    fn attempt_budget_exhausts_after_max_guesses() {
        let now = Utc::now();
        let identifier = Identifier::parse("user@test.com").unwrap();
        let mut code = VerificationCode::new(identifier, now);

        for _ in 0..MAX_CODE_ATTEMPTS - 1 {
            assert!(!code.register_failed_attempt());
        }
        assert!(code.register_failed_attempt());
    }
}
