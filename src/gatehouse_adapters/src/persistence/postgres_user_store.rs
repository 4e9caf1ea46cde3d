use std::sync::Arc;

use gatehouse_core::{
    FederatedProvider, Identifier, NewUser, RecoveryCode, SecretCipher, User, UserId, UserStore,
    UserStoreError, UserUpdate,
};
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};

const USER_COLUMNS: &str = "id, name, email, email_verified, mobile, mobile_verified, \
     avatar_url, google_id, linkedin_id, two_factor_enabled, two_factor_secret, \
     two_factor_recovery_code";

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    email: Option<String>,
    email_verified: bool,
    mobile: Option<String>,
    mobile_verified: bool,
    avatar_url: Option<String>,
    google_id: Option<String>,
    linkedin_id: Option<String>,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    two_factor_recovery_code: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            name: row.name,
            email: row.email,
            email_verified: row.email_verified,
            mobile: row.mobile,
            mobile_verified: row.mobile_verified,
            avatar_url: row.avatar_url,
            google_id: row.google_id,
            linkedin_id: row.linkedin_id,
            two_factor_enabled: row.two_factor_enabled,
            two_factor_secret: row.two_factor_secret,
            two_factor_recovery_code: row.two_factor_recovery_code,
        }
    }
}

pub struct PostgresUserStore {
    pool: Pool<Postgres>,
    cipher: Arc<dyn SecretCipher>,
}

impl PostgresUserStore {
    pub fn new(pool: Pool<Postgres>, cipher: Arc<dyn SecretCipher>) -> Self {
        Self { pool, cipher }
    }

    fn seal(&self, code: &RecoveryCode) -> Result<String, UserStoreError> {
        self.cipher
            .seal(code.as_str().as_bytes())
            .map_err(|e| UserStoreError::Unexpected(e.to_string()))
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
impl UserStore for PostgresUserStore {
    #[tracing::instrument(name = "Adding user to PostgreSQL", skip_all)]
    async fn create_user(&self, user: NewUser) -> Result<User, UserStoreError> {
        let recovery_code = self.seal(&RecoveryCode::generate())?;

        let query = format!(
            "INSERT INTO users (id, name, email, email_verified, mobile, mobile_verified, \
             avatar_url, google_id, linkedin_id, two_factor_recovery_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user.id.as_str())
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.email_verified)
            .bind(&user.mobile)
            .bind(user.mobile_verified)
            .bind(&user.avatar_url)
            .bind(&user.google_id)
            .bind(&user.linkedin_id)
            .bind(&recovery_code)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    #[tracing::instrument(name = "Retrieving user from PostgreSQL", skip_all)]
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, UserStoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(User::from))
    }

    #[tracing::instrument(name = "Retrieving user by identifier", skip_all)]
    async fn get_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, UserStoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR mobile = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(identifier.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(User::from))
    }

    #[tracing::instrument(name = "Retrieving user by federated id", skip_all)]
    async fn get_user_by_federated_id(
        &self,
        provider: FederatedProvider,
        subject: &str,
    ) -> Result<Option<User>, UserStoreError> {
        let column = match provider {
            FederatedProvider::Google => "google_id",
            FederatedProvider::Linkedin => "linkedin_id",
        };
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(User::from))
    }

    #[tracing::instrument(name = "Updating user in PostgreSQL", skip_all)]
    async fn update_user(&self, id: &UserId, update: UserUpdate) -> Result<User, UserStoreError> {
        if update.is_empty() {
            return self
                .get_user(id)
                .await?
                .ok_or(UserStoreError::UserNotFound);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &update.name {
            fields.push("name = ").push_bind_unseparated(name);
        }
        if let Some(email) = &update.email {
            fields.push("email = ").push_bind_unseparated(email);
        }
        if let Some(email_verified) = update.email_verified {
            fields
                .push("email_verified = ")
                .push_bind_unseparated(email_verified);
        }
        if let Some(mobile) = &update.mobile {
            fields.push("mobile = ").push_bind_unseparated(mobile);
        }
        if let Some(mobile_verified) = update.mobile_verified {
            fields
                .push("mobile_verified = ")
                .push_bind_unseparated(mobile_verified);
        }
        if let Some(avatar_url) = &update.avatar_url {
            fields.push("avatar_url = ").push_bind_unseparated(avatar_url);
        }
        if let Some(google_id) = &update.google_id {
            fields.push("google_id = ").push_bind_unseparated(google_id);
        }
        if let Some(linkedin_id) = &update.linkedin_id {
            fields
                .push("linkedin_id = ")
                .push_bind_unseparated(linkedin_id);
        }
        if let Some(two_factor_enabled) = update.two_factor_enabled {
            fields
                .push("two_factor_enabled = ")
                .push_bind_unseparated(two_factor_enabled);
        }
        if let Some(two_factor_secret) = &update.two_factor_secret {
            fields
                .push("two_factor_secret = ")
                .push_bind_unseparated(two_factor_secret);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id.as_str());
        builder.push(format!(" RETURNING {USER_COLUMNS}"));

        let row = builder
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(User::from).ok_or(UserStoreError::UserNotFound)
    }

    #[tracing::instrument(name = "Resetting two-factor with recovery code", skip_all)]
    async fn reset_two_factor_with_recovery_code(
        &self,
        id: &UserId,
        submitted: &RecoveryCode,
    ) -> Result<RecoveryCode, UserStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Row-level exclusive lock: a concurrent reset blocks here and then
        // fails the comparison against the already-rotated code.
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(UserStoreError::UserNotFound)?;

        let stored = self
            .cipher
            .open(&row.two_factor_recovery_code)
            .map_err(|e| UserStoreError::Unexpected(e.to_string()))?;
        let stored =
            String::from_utf8(stored).map_err(|e| UserStoreError::Unexpected(e.to_string()))?;

        if stored != submitted.as_str() {
            return Err(UserStoreError::InvalidRecoveryCode);
        }

        let replacement = RecoveryCode::generate();
        let sealed = self.seal(&replacement)?;

        sqlx::query(
            "UPDATE users SET two_factor_secret = NULL, two_factor_enabled = FALSE, \
             two_factor_recovery_code = $1 WHERE id = $2",
        )
        .bind(&sealed)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(replacement)
    }
}
