//! # Gatehouse - Authentication Session & Credential Lifecycle Engine
//!
//! This is a facade crate that re-exports all public APIs from the
//! authentication engine's components. Use this crate to get access to the
//! whole engine in one place.
//!
//! ## Usage
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! gatehouse = { path = "../gatehouse" }
//! ```
//!
//! ## Structure
//!
//! - **Core domain types**: `Session`, `SessionToken`, `VerificationCode`,
//!   `User`, `TotpKey`, `RecoveryCode`, etc.
//! - **Repository traits**: `SessionStore`, `VerificationCodeStore`,
//!   `UserStore`, `RateLimiter`
//! - **Use cases**: `OtpLoginUseCase`, `OAuthCallbackUseCase`,
//!   `ReconcileIdentityUseCase`, the two-factor use cases, etc.
//! - **Adapters**: `RedisSessionStore`, `PostgresUserStore`, `TotpEngine`,
//!   `ChaChaSecretCipher`, the OAuth providers, etc.
//! - **Service**: `AuthService` - the composed router and infrastructure
//!   constructors

// ============================================================================
// Core Domain Types
// ============================================================================

/// Core domain types and value objects
pub mod core {
    pub use gatehouse_core::*;
}

// Re-export most commonly used core types at the root level
pub use gatehouse_core::{
    AuthError, BucketState, ConflictKind, FederatedProvider, Identifier, IdentityAssertion,
    NewUser, OtpCode, RecoveryCode, Session, SessionId, SessionToken, TotpKey, TwoFactorError,
    User, UserId, UserUpdate, VerificationCode,
};

// ============================================================================
// Repository Traits (Ports)
// ============================================================================

/// Repository trait definitions
pub mod repositories {
    pub use gatehouse_core::{
        RateLimitError, RateLimiter, SessionStore, SessionStoreError, UserStore, UserStoreError,
        VerificationCodeStore, VerificationCodeStoreError, WebauthnCredentialStore,
    };
}

// Re-export repository and service traits at root level
pub use gatehouse_core::{
    EmailClient, OAuthProfile, OAuthProvider, RateLimiter, SecretCipher, SessionStore, SmsClient,
    TwoFactorEngine, UserStore, VerificationCodeStore,
};

// ============================================================================
// Use Cases (Application Layer)
// ============================================================================

/// Application use cases
pub mod use_cases {
    pub use gatehouse_application::*;
}

// Re-export use cases at root level
pub use gatehouse_application::{
    AuthenticatedLogin, CurrentSession, LogoutUseCase, OAuthCallbackUseCase, OtpLoginUseCase,
    ReconcileIdentityUseCase, RequestCodeUseCase, ResolveSessionUseCase, TwoFactorResetUseCase,
    TwoFactorSetupUseCase, TwoFactorVerifyUseCase,
};

// ============================================================================
// Adapters (Infrastructure)
// ============================================================================

/// Infrastructure adapters
pub mod adapters {
    /// Persistence implementations
    pub mod persistence {
        pub use gatehouse_adapters::persistence::*;
    }

    /// Two-factor engine and secret sealing
    pub mod two_factor {
        pub use gatehouse_adapters::two_factor::*;
    }

    /// OAuth provider clients
    pub mod oauth {
        pub use gatehouse_adapters::oauth::*;
    }

    /// Email client implementations
    pub mod email {
        pub use gatehouse_adapters::email::*;
    }

    /// SMS client implementations
    pub mod sms {
        pub use gatehouse_adapters::sms::*;
    }

    /// Configuration
    pub mod config {
        pub use gatehouse_adapters::config::*;
    }
}

// Re-export commonly used adapters at root level
pub use gatehouse_adapters::{
    email::MockEmailClient,
    oauth::{GoogleProvider, LinkedinProvider},
    persistence::{
        HashMapSessionStore, HashMapUserStore, HashMapVerificationCodeStore, InMemoryRateLimiter,
        PostgresUserStore, RedisRateLimiter, RedisSessionStore, RedisVerificationCodeStore,
    },
    sms::MockSmsClient,
    two_factor::{ChaChaSecretCipher, TotpEngine},
};

// ============================================================================
// Auth Service (Main Entry Point)
// ============================================================================

/// Main auth service
pub use gatehouse_auth_service::{
    AuthService, build_state, configure_postgresql, configure_redis, in_memory_state,
};

// ============================================================================
// Re-export common external dependencies
// ============================================================================

/// Re-export async-trait for implementing repository traits
pub use async_trait::async_trait;

/// Re-export secrecy for working with secrets
pub use secrecy::{ExposeSecret, Secret};

pub use http;
