use base64::{Engine as _, engine::general_purpose::STANDARD};
use config::{Config, Environment as EnvSource, File};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("encryption key must be base64 of exactly 32 bytes")]
    InvalidEncryptionKey,
    #[error("cookie key must be base64 of at least 64 bytes")]
    InvalidCookieKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientSettings {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthSettings {
    pub google: Option<OAuthClientSettings>,
    pub linkedin: Option<OAuthClientSettings>,
}

/// Process configuration, loaded once at startup and handed to the
/// constructors of every component that needs it. Nothing reads the
/// environment after this point.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_environment")]
    pub environment: Environment,
    pub redis_url: String,
    pub database_url: Secret<String>,
    /// Base64 of the 32-byte process-wide sealing key.
    pub encryption_key: Secret<String>,
    /// Base64 of the cookie signing key (64+ bytes).
    pub cookie_key: Secret<String>,
    #[serde(default = "default_app_name")]
    pub totp_issuer: String,
    #[serde(default)]
    pub oauth: OAuthSettings,
}

fn default_app_name() -> String {
    "gatehouse".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_environment() -> Environment {
    Environment::Development
}

impl Settings {
    /// Loads from an optional `gatehouse.json` file, overridden by
    /// `GATEHOUSE__`-prefixed environment variables.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("gatehouse").required(false))
            .add_source(EnvSource::with_prefix("GATEHOUSE").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn sealing_key(&self) -> Result<[u8; 32], SettingsError> {
        let bytes = STANDARD
            .decode(self.encryption_key.expose_secret())
            .map_err(|_| SettingsError::InvalidEncryptionKey)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| SettingsError::InvalidEncryptionKey)
    }

    pub fn cookie_signing_key(&self) -> Result<Vec<u8>, SettingsError> {
        let bytes = STANDARD
            .decode(self.cookie_key.expose_secret())
            .map_err(|_| SettingsError::InvalidCookieKey)?;
        if bytes.len() < 64 {
            return Err(SettingsError::InvalidCookieKey);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_keys(encryption_key: &str, cookie_key: &str) -> Settings {
        Settings {
            app_name: default_app_name(),
            listen_addr: default_listen_addr(),
            environment: Environment::Development,
            redis_url: "redis://localhost".to_string(),
            database_url: Secret::from("postgres://localhost/gatehouse".to_string()),
            encryption_key: Secret::from(encryption_key.to_string()),
            cookie_key: Secret::from(cookie_key.to_string()),
            totp_issuer: default_app_name(),
            oauth: OAuthSettings::default(),
        }
    }

    #[test]
    fn sealing_key_requires_exactly_32_bytes() {
        let good = STANDARD.encode([1u8; 32]);
        let short = STANDARD.encode([1u8; 16]);

        assert!(settings_with_keys(&good, &good).sealing_key().is_ok());
        assert!(matches!(
            settings_with_keys(&short, &good).sealing_key(),
            Err(SettingsError::InvalidEncryptionKey)
        ));
        assert!(matches!(
            settings_with_keys("not-base64!!!", &good).sealing_key(),
            Err(SettingsError::InvalidEncryptionKey)
        ));
    }

    #[test]
    fn cookie_key_requires_at_least_64_bytes() {
        let encryption = STANDARD.encode([1u8; 32]);
        let good = STANDARD.encode([2u8; 64]);
        let short = STANDARD.encode([2u8; 32]);

        assert!(
            settings_with_keys(&encryption, &good)
                .cookie_signing_key()
                .is_ok()
        );
        assert!(matches!(
            settings_with_keys(&encryption, &short).cookie_signing_key(),
            Err(SettingsError::InvalidCookieKey)
        ));
    }
}
