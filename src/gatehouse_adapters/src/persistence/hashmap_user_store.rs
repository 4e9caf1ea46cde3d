use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gatehouse_core::{
    FederatedProvider, Identifier, NewUser, RecoveryCode, SecretCipher, User, UserId, UserStore,
    UserStoreError, UserUpdate,
};
use tokio::sync::RwLock;

/// In-memory user store for development and tests. Mirrors the Postgres
/// store's semantics: unique identifiers and federated ids, sealed
/// two-factor material, and an exclusive write lock standing in for the
/// row lock on recovery-code reset.
#[derive(Clone)]
pub struct HashMapUserStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    cipher: Arc<dyn SecretCipher>,
    writes: Arc<AtomicU64>,
}

impl HashMapUserStore {
    pub fn new(cipher: Arc<dyn SecretCipher>) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            cipher,
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Test hook: number of mutating operations issued so far. Used to
    /// assert reconciliation idempotence.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Test hook: pin a known recovery code on a user.
    pub async fn set_recovery_code_for_tests(&self, id: &UserId, code: &RecoveryCode) {
        let sealed = self
            .cipher
            .seal(code.as_str().as_bytes())
            .expect("sealing recovery code");
        if let Some(user) = self.users.write().await.get_mut(id) {
            user.two_factor_recovery_code = sealed;
        }
    }

    fn seal_fresh_recovery_code(&self) -> Result<String, UserStoreError> {
        let code = RecoveryCode::generate();
        self.cipher
            .seal(code.as_str().as_bytes())
            .map_err(|e| UserStoreError::Unexpected(e.to_string()))
    }
}

#[async_trait::async_trait]
impl UserStore for HashMapUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, UserStoreError> {
        let mut users = self.users.write().await;

        let duplicate = users.values().any(|existing| {
            (user.email.is_some() && existing.email == user.email)
                || (user.mobile.is_some() && existing.mobile == user.mobile)
                || (user.google_id.is_some() && existing.google_id == user.google_id)
                || (user.linkedin_id.is_some() && existing.linkedin_id == user.linkedin_id)
        });
        if duplicate {
            return Err(UserStoreError::DuplicateIdentifier);
        }

        let record = User {
            id: user.id.clone(),
            name: user.name,
            email: user.email,
            email_verified: user.email_verified,
            mobile: user.mobile,
            mobile_verified: user.mobile_verified,
            avatar_url: user.avatar_url,
            google_id: user.google_id,
            linkedin_id: user.linkedin_id,
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_recovery_code: self.seal_fresh_recovery_code()?,
        };
        users.insert(user.id, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn get_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, UserStoreError> {
        let value = identifier.as_str();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| {
                user.email.as_deref() == Some(value) || user.mobile.as_deref() == Some(value)
            })
            .cloned())
    }

    async fn get_user_by_federated_id(
        &self,
        provider: FederatedProvider,
        subject: &str,
    ) -> Result<Option<User>, UserStoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.federated_id(provider) == Some(subject))
            .cloned())
    }

    async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User, UserStoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or(UserStoreError::UserNotFound)?;

        if let Some(name) = update.name {
            user.name = Some(name);
        }
        if let Some(email) = update.email {
            user.email = Some(email);
        }
        if let Some(email_verified) = update.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(mobile) = update.mobile {
            user.mobile = Some(mobile);
        }
        if let Some(mobile_verified) = update.mobile_verified {
            user.mobile_verified = mobile_verified;
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(google_id) = update.google_id {
            user.google_id = Some(google_id);
        }
        if let Some(linkedin_id) = update.linkedin_id {
            user.linkedin_id = Some(linkedin_id);
        }
        if let Some(two_factor_enabled) = update.two_factor_enabled {
            user.two_factor_enabled = two_factor_enabled;
        }
        if let Some(two_factor_secret) = update.two_factor_secret {
            user.two_factor_secret = Some(two_factor_secret);
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(user.clone())
    }

    async fn reset_two_factor_with_recovery_code(
        &self,
        id: &UserId,
        submitted: &RecoveryCode,
    ) -> Result<RecoveryCode, UserStoreError> {
        // The write guard plays the part of the row lock: the read, the
        // compare and the rotation happen under one exclusive section.
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or(UserStoreError::UserNotFound)?;

        let stored = self
            .cipher
            .open(&user.two_factor_recovery_code)
            .map_err(|e| UserStoreError::Unexpected(e.to_string()))?;
        let stored =
            String::from_utf8(stored).map_err(|e| UserStoreError::Unexpected(e.to_string()))?;

        if stored != submitted.as_str() {
            return Err(UserStoreError::InvalidRecoveryCode);
        }

        let replacement = RecoveryCode::generate();
        user.two_factor_secret = None;
        user.two_factor_enabled = false;
        user.two_factor_recovery_code = self
            .cipher
            .seal(replacement.as_str().as_bytes())
            .map_err(|e| UserStoreError::Unexpected(e.to_string()))?;

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_core::IdentityAssertion;

    use crate::two_factor::ChaChaSecretCipher;

    use super::*;

    fn store() -> HashMapUserStore {
        HashMapUserStore::new(Arc::new(ChaChaSecretCipher::new(&[11u8; 32])))
    }

    fn new_user(email: &str) -> NewUser {
        let assertion = IdentityAssertion {
            federated: None,
            email: Some(email.to_string()),
            email_verified: true,
            mobile: None,
            mobile_verified: false,
            name: None,
            avatar_url: None,
        };
        NewUser::from_assertion(&assertion).unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = store();
        store.create_user(new_user("a@test.com")).await.unwrap();

        let result = store.create_user(new_user("a@test.com")).await;
        assert_eq!(result.unwrap_err(), UserStoreError::DuplicateIdentifier);
    }

    #[tokio::test]
    async fn recovery_code_is_sealed_at_creation() {
        let store = store();
        let user = store.create_user(new_user("a@test.com")).await.unwrap();

        // 16-char plaintext would be shorter than any sealed blob.
        assert!(user.two_factor_recovery_code.len() > 16);
    }

    #[tokio::test]
    async fn concurrent_recovery_resets_cannot_both_succeed() {
        let store = store();
        let user = store.create_user(new_user("a@test.com")).await.unwrap();
        let code = RecoveryCode::generate();
        store.set_recovery_code_for_tests(&user.id, &code).await;

        let (first, second) = tokio::join!(
            store.reset_two_factor_with_recovery_code(&user.id, &code),
            store.reset_two_factor_with_recovery_code(&user.id, &code),
        );

        // Exactly one side wins; the other sees the already-rotated code.
        assert_ne!(first.is_ok(), second.is_ok());
        let loser = if first.is_ok() { second } else { first };
        assert_eq!(loser.unwrap_err(), UserStoreError::InvalidRecoveryCode);
    }

    #[tokio::test]
    async fn generated_users_are_all_retrievable() {
        use fake::{Fake, faker::internet::en::SafeEmail};

        let store = store();
        for _ in 0..20 {
            let email: String = SafeEmail().fake::<String>().to_lowercase();
            if store.create_user(new_user(&email)).await.is_ok() {
                let found = store
                    .get_user_by_identifier(&Identifier::parse(&email).unwrap())
                    .await
                    .unwrap();
                assert!(found.is_some());
            }
        }
    }

    #[tokio::test]
    async fn lookup_by_identifier_matches_email_and_mobile() {
        let store = store();
        let user = store.create_user(new_user("a@test.com")).await.unwrap();

        let found = store
            .get_user_by_identifier(&Identifier::parse("a@test.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);

        assert!(
            store
                .get_user_by_identifier(&Identifier::parse("b@test.com").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }
}
