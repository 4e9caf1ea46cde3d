use std::sync::Arc;

use chrono::Utc;
use gatehouse_core::{BucketState, RateLimitError, RateLimiter, ports::repositories::check_cost};
use redis::{Commands, Connection};
use tokio::sync::RwLock;

use crate::config::{LimiterConfig, RATE_LIMIT_KEY_PREFIX};

/// Redis-backed token bucket. Refill is computed lazily on each consumption
/// attempt; the stored state is replaced with one atomic write whose TTL
/// lets idle, fully-refilled buckets expire on their own.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: Arc<RwLock<Connection>>,
    namespace: &'static str,
    max: u32,
    refill_interval_seconds: u64,
}

impl RedisRateLimiter {
    pub fn new(conn: Arc<RwLock<Connection>>, config: LimiterConfig) -> Self {
        Self {
            conn,
            namespace: config.namespace,
            max: config.max,
            refill_interval_seconds: config.refill_interval_seconds,
        }
    }

    fn get_key(&self, key: &str) -> String {
        format!("{RATE_LIMIT_KEY_PREFIX}{}:{key}", self.namespace)
    }

    async fn fetch(&self, key: &str) -> Option<BucketState> {
        let mut conn = self.conn.write().await;
        let raw: Option<String> = match conn.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                // A degraded cache fails open: the caller sees a full bucket.
                tracing::warn!(error = %e, "rate limit read failed, treating as miss");
                return None;
            }
        };
        serde_json::from_str(&raw?).ok()
    }

    /// Single MULTI-wrapped SET..EX so the value and its TTL land together.
    async fn write(&self, key: &str, state: BucketState) -> Result<(), RateLimitError> {
        let payload =
            serde_json::to_string(&state).map_err(|e| RateLimitError::Store(e.to_string()))?;
        let ttl = state.expiry_seconds(self.max, self.refill_interval_seconds);

        let mut conn = self.conn.write().await;
        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(ttl)
            .ignore()
            .query::<()>(&mut *conn)
            .map_err(|e| RateLimitError::Store(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RateLimiter for RedisRateLimiter {
    #[tracing::instrument(name = "Consuming rate limit tokens", skip(self))]
    async fn consume(&self, key: &str, cost: u32) -> Result<bool, RateLimitError> {
        check_cost(cost, self.max)?;

        let redis_key = self.get_key(key);
        let now = Utc::now().timestamp();

        let next = match self.fetch(&redis_key).await {
            // No bucket yet: start from a full one minus this cost.
            None => BucketState {
                count: self.max - cost,
                refilled_at: now,
            },
            Some(state) => {
                match state.debit(self.max, self.refill_interval_seconds, now, cost) {
                    Some(next) => next,
                    // Rejected without mutating the stored state.
                    None => return Ok(false),
                }
            }
        };

        self.write(&redis_key, next).await?;
        Ok(true)
    }

    async fn remaining_tokens(&self, key: &str) -> Result<u32, RateLimitError> {
        let redis_key = self.get_key(key);
        let Some(state) = self.fetch(&redis_key).await else {
            return Ok(self.max);
        };
        Ok(state.refilled_count(self.max, self.refill_interval_seconds, Utc::now().timestamp()))
    }

    fn refill_interval_seconds(&self) -> u64 {
        self.refill_interval_seconds
    }
}
