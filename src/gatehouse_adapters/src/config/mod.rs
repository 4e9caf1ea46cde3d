pub mod constants;
pub mod settings;

pub use constants::*;
pub use settings::{Environment, OAuthClientSettings, OAuthSettings, Settings, SettingsError};
