use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

/// A registered passkey. Ceremony verification happens upstream; this core
/// only keeps the per-user credential list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebauthnCredential {
    pub id: String,
    pub user_id: UserId,
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub sign_count: i64,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}
