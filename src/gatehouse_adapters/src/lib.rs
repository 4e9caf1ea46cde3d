pub mod config;
pub mod email;
pub mod oauth;
pub mod persistence;
pub mod sms;
pub mod two_factor;

/// Embedded schema migrations for the relational user store.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
