use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use gatehouse_core::{
    Identifier, OtpCode, VerificationCode, VerificationCodeStore, VerificationCodeStoreError,
};
use tokio::sync::RwLock;

/// In-memory verification code store for development and tests.
#[derive(Default, Clone)]
pub struct HashMapVerificationCodeStore {
    codes: Arc<RwLock<HashMap<Identifier, VerificationCode>>>,
}

impl HashMapVerificationCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: backdate the stored code's expiry.
    pub async fn expire_code_for_tests(&self, identifier: &Identifier) {
        if let Some(code) = self.codes.write().await.get_mut(identifier) {
            code.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[async_trait::async_trait]
impl VerificationCodeStore for HashMapVerificationCodeStore {
    async fn request_code(
        &self,
        identifier: &Identifier,
    ) -> Result<VerificationCode, VerificationCodeStoreError> {
        let code = VerificationCode::new(identifier.clone(), Utc::now());
        // Insert replaces any pending code for this identifier.
        self.codes
            .write()
            .await
            .insert(identifier.clone(), code.clone());
        Ok(code)
    }

    async fn validate_code(
        &self,
        identifier: &Identifier,
        code: &OtpCode,
    ) -> Result<Option<VerificationCode>, VerificationCodeStoreError> {
        let mut codes = self.codes.write().await;

        let Some(stored) = codes.get_mut(identifier) else {
            return Ok(None);
        };

        if stored.is_expired(Utc::now()) {
            codes.remove(identifier);
            return Ok(None);
        }

        if !stored.matches(code) {
            if stored.register_failed_attempt() {
                codes.remove(identifier);
            }
            return Ok(None);
        }

        Ok(codes.remove(identifier))
    }

    async fn invalidate_code(
        &self,
        identifier: &Identifier,
    ) -> Result<(), VerificationCodeStoreError> {
        self.codes.write().await.remove(identifier);
        Ok(())
    }
}
