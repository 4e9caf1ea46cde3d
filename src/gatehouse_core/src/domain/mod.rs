pub mod error;
pub mod identifier;
pub mod rate_limit;
pub mod session;
pub mod two_factor;
pub mod user;
pub mod verification_code;
pub mod webauthn;
