mod hashmap_session_store;
mod hashmap_user_store;
mod hashmap_verification_code_store;
mod in_memory_rate_limiter;
mod postgres_user_store;
mod postgres_webauthn_store;
mod redis_rate_limiter;
mod redis_session_store;
mod redis_verification_code_store;

pub use hashmap_session_store::HashMapSessionStore;
pub use hashmap_user_store::HashMapUserStore;
pub use hashmap_verification_code_store::HashMapVerificationCodeStore;
pub use in_memory_rate_limiter::InMemoryRateLimiter;
pub use postgres_user_store::PostgresUserStore;
pub use postgres_webauthn_store::PostgresWebauthnCredentialStore;
pub use redis_rate_limiter::RedisRateLimiter;
pub use redis_session_store::RedisSessionStore;
pub use redis_verification_code_store::RedisVerificationCodeStore;
