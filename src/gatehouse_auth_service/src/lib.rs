pub mod auth_service;
pub mod tracing;

pub use auth_service::{
    AuthService, build_state, configure_postgresql, configure_redis, in_memory_state,
};
