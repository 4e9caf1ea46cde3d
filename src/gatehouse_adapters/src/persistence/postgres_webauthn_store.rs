use chrono::{DateTime, Utc};
use gatehouse_core::{UserId, UserStoreError, WebauthnCredential, WebauthnCredentialStore};
use sqlx::{FromRow, Pool, Postgres};

#[derive(Debug, FromRow)]
struct CredentialRow {
    id: String,
    user_id: String,
    credential_id: String,
    public_key: Vec<u8>,
    sign_count: i64,
    name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CredentialRow> for WebauthnCredential {
    fn from(row: CredentialRow) -> Self {
        Self {
            id: row.id,
            user_id: UserId::new(row.user_id),
            credential_id: row.credential_id,
            public_key: row.public_key,
            sign_count: row.sign_count,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// Keyed passkey list per user; ceremony validation lives upstream.
pub struct PostgresWebauthnCredentialStore {
    pool: Pool<Postgres>,
}

impl PostgresWebauthnCredentialStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_sqlx_error(error: sqlx::Error) -> UserStoreError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            return UserStoreError::DuplicateIdentifier;
        }
    }
    UserStoreError::Unexpected(error.to_string())
}

#[async_trait::async_trait]
impl WebauthnCredentialStore for PostgresWebauthnCredentialStore {
    #[tracing::instrument(name = "Adding webauthn credential", skip_all)]
    async fn add_credential(&self, credential: WebauthnCredential) -> Result<(), UserStoreError> {
        sqlx::query(
            "INSERT INTO webauthn_credentials \
             (id, user_id, credential_id, public_key, sign_count, name, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&credential.id)
        .bind(credential.user_id.as_str())
        .bind(&credential.credential_id)
        .bind(&credential.public_key)
        .bind(credential.sign_count)
        .bind(&credential.name)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[tracing::instrument(name = "Listing webauthn credentials", skip_all)]
    async fn list_credentials(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<WebauthnCredential>, UserStoreError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, user_id, credential_id, public_key, sign_count, name, created_at \
             FROM webauthn_credentials WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(WebauthnCredential::from).collect())
    }

    #[tracing::instrument(name = "Deleting webauthn credential", skip_all)]
    async fn delete_credential(&self, user_id: &UserId, id: &str) -> Result<(), UserStoreError> {
        let result = sqlx::query("DELETE FROM webauthn_credentials WHERE user_id = $1 AND id = $2")
            .bind(user_id.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::UserNotFound);
        }
        Ok(())
    }
}
