use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatehouse_core::{
    Identifier, OtpCode, VerificationCode, VerificationCodeStore, VerificationCodeStoreError,
};
use redis::{Commands, Connection};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::VERIFICATION_KEY_PREFIX;

#[derive(Debug, Serialize, Deserialize)]
struct StoredVerificationCode {
    code: String,
    identifier: String,
    is_email: bool,
    expires_at: i64,
    attempts: u8,
}

impl From<&VerificationCode> for StoredVerificationCode {
    fn from(code: &VerificationCode) -> Self {
        Self {
            code: code.code.as_str().to_string(),
            identifier: code.identifier.as_str().to_string(),
            is_email: code.identifier.is_email(),
            expires_at: code.expires_at.timestamp(),
            attempts: code.attempts,
        }
    }
}

impl StoredVerificationCode {
    fn into_domain(self) -> Option<VerificationCode> {
        let identifier = if self.is_email {
            Identifier::Email(self.identifier)
        } else {
            Identifier::Mobile(self.identifier)
        };
        Some(VerificationCode {
            code: OtpCode::parse(&self.code).ok()?,
            identifier,
            expires_at: DateTime::from_timestamp(self.expires_at, 0)?,
            attempts: self.attempts,
        })
    }
}

#[derive(Clone)]
pub struct RedisVerificationCodeStore {
    conn: Arc<RwLock<Connection>>,
}

impl RedisVerificationCodeStore {
    pub fn new(conn: Arc<RwLock<Connection>>) -> Self {
        Self { conn }
    }

    async fn fetch(&self, key: &str) -> Option<VerificationCode> {
        let mut conn = self.conn.write().await;
        let raw: Option<String> = match conn.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "verification code read failed, treating as miss");
                return None;
            }
        };
        serde_json::from_str::<StoredVerificationCode>(&raw?)
            .ok()
            .and_then(StoredVerificationCode::into_domain)
    }

    async fn write(
        &self,
        code: &VerificationCode,
        ttl: u64,
    ) -> Result<(), VerificationCodeStoreError> {
        let payload = serde_json::to_string(&StoredVerificationCode::from(code))
            .map_err(|e| VerificationCodeStoreError::Cache(e.to_string()))?;
        let mut conn = self.conn.write().await;
        conn.set_ex(get_key(&code.identifier), payload, ttl)
            .map_err(|e| VerificationCodeStoreError::Cache(e.to_string()))
    }

    async fn delete_best_effort(&self, identifier: &Identifier) {
        let mut conn = self.conn.write().await;
        if let Err(e) = conn.del::<_, ()>(get_key(identifier)) {
            tracing::warn!(error = %e, "verification code delete failed");
        }
    }
}

#[async_trait::async_trait]
impl VerificationCodeStore for RedisVerificationCodeStore {
    #[tracing::instrument(name = "Issuing verification code", skip_all)]
    async fn request_code(
        &self,
        identifier: &Identifier,
    ) -> Result<VerificationCode, VerificationCodeStoreError> {
        // At most one live code per identifier: a new request always
        // replaces whatever was pending.
        self.delete_best_effort(identifier).await;

        let now = Utc::now();
        let code = VerificationCode::new(identifier.clone(), now);
        self.write(&code, code.ttl_seconds(now)).await?;
        Ok(code)
    }

    #[tracing::instrument(name = "Validating verification code", skip_all)]
    async fn validate_code(
        &self,
        identifier: &Identifier,
        code: &OtpCode,
    ) -> Result<Option<VerificationCode>, VerificationCodeStoreError> {
        let Some(mut stored) = self.fetch(&get_key(identifier)).await else {
            return Ok(None);
        };

        let now = Utc::now();
        if stored.is_expired(now) {
            self.delete_best_effort(identifier).await;
            return Ok(None);
        }

        if !stored.matches(code) {
            // A wrong guess burns one attempt but keeps the code alive
            // until the budget runs out.
            if stored.register_failed_attempt() {
                self.delete_best_effort(identifier).await;
            } else if let Err(e) = self.write(&stored, stored.ttl_seconds(now)).await {
                tracing::warn!(error = %e, "failed to record guess attempt");
            }
            return Ok(None);
        }

        // Single use: consumed on first successful match.
        self.delete_best_effort(identifier).await;
        Ok(Some(stored))
    }

    #[tracing::instrument(name = "Invalidating verification code", skip_all)]
    async fn invalidate_code(
        &self,
        identifier: &Identifier,
    ) -> Result<(), VerificationCodeStoreError> {
        self.delete_best_effort(identifier).await;
        Ok(())
    }
}

fn get_key(identifier: &Identifier) -> String {
    format!("{VERIFICATION_KEY_PREFIX}{}", identifier.as_str())
}
