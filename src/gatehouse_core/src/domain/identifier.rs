use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

// Accepted phone shapes: +<country><number>, bare international digits,
// or a 0-prefixed local number (normalized to +49).
static PHONE_WITH_PLUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{10,15}$").expect("valid phone pattern"));
static PHONE_NO_PLUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{11,15}$").expect("valid phone pattern"));
static PHONE_LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0\d{10,11}$").expect("valid phone pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("not a valid email address or phone number")]
    Unrecognized,
}

/// A normalized contact identifier - the primary key of every verification
/// flow. Emails are lowercased, phone numbers reduced to `+`-prefixed digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Email(String),
    Mobile(String),
}

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();

        if EMAIL_PATTERN.is_match(trimmed) {
            return Ok(Self::Email(trimmed.to_lowercase()));
        }

        let digits: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();

        if PHONE_WITH_PLUS.is_match(&digits) {
            return Ok(Self::Mobile(digits));
        }
        if PHONE_LOCAL.is_match(&digits) {
            return Ok(Self::Mobile(format!("+49{}", &digits[1..])));
        }
        if PHONE_NO_PLUS.is_match(&digits) {
            return Ok(Self::Mobile(format!("+{digits}")));
        }

        Err(IdentifierError::Unrecognized)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(value) | Self::Mobile(value) => value,
        }
    }

    pub fn is_email(&self) -> bool {
        matches!(self, Self::Email(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
