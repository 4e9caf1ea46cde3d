//! Axum transport for the authentication engine: thin route handlers over
//! the use cases, plus the signed-cookie contract for session tokens and
//! ephemeral OAuth flow state.

pub mod cookies;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::AuthApiError;
pub use routes::router;
pub use state::AuthState;
