use thiserror::Error;

/// Conflicts the caller must render distinctly.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("identity is already linked to another account")]
    IdentityAlreadyLinked,
    #[error("a user with this identifier already exists")]
    UserCreationConflict,
}

/// The error taxonomy surfaced at the authentication boundary. Lower-level
/// repository and cache errors are converted into these variants before they
/// can reach a caller; raw transport errors never leak past this point.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Conflict(ConflictKind),
    #[error("external provider failure: {0}")]
    ExternalProvider(String),
    #[error("rate limited, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("unexpected error: {0}")]
    Unexpected(String),
}
