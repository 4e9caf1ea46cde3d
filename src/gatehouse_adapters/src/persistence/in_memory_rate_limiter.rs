use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use gatehouse_core::{BucketState, RateLimitError, RateLimiter, ports::repositories::check_cost};

/// Process-local token bucket sharing the same refill math as the Redis
/// variant. Used in development mode and tests.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    buckets: Arc<DashMap<String, BucketState>>,
    namespace: &'static str,
    max: u32,
    refill_interval_seconds: u64,
}

impl InMemoryRateLimiter {
    pub fn new(namespace: &'static str, max: u32, refill_interval_seconds: u64) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            namespace,
            max,
            refill_interval_seconds,
        }
    }

    fn get_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }
}

#[async_trait::async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn consume(&self, key: &str, cost: u32) -> Result<bool, RateLimitError> {
        check_cost(cost, self.max)?;

        let now = Utc::now().timestamp();
        let mut entry = self
            .buckets
            .entry(self.get_key(key))
            .or_insert(BucketState {
                count: self.max,
                refilled_at: now,
            });

        match entry.debit(self.max, self.refill_interval_seconds, now, cost) {
            Some(next) => {
                *entry = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remaining_tokens(&self, key: &str) -> Result<u32, RateLimitError> {
        let now = Utc::now().timestamp();
        Ok(self
            .buckets
            .get(&self.get_key(key))
            .map(|state| state.refilled_count(self.max, self.refill_interval_seconds, now))
            .unwrap_or(self.max))
    }

    fn refill_interval_seconds(&self) -> u64 {
        self.refill_interval_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_after_max_consumptions() {
        let limiter = InMemoryRateLimiter::new("test", 5, 60);

        for _ in 0..5 {
            assert!(limiter.consume("ip:1.2.3.4", 1).await.unwrap());
        }
        assert!(!limiter.consume("ip:1.2.3.4", 1).await.unwrap());
        assert_eq!(limiter.remaining_tokens("ip:1.2.3.4").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let limiter = InMemoryRateLimiter::new("test", 1, 60);

        assert!(limiter.consume("ip:1.1.1.1", 1).await.unwrap());
        assert!(!limiter.consume("ip:1.1.1.1", 1).await.unwrap());
        assert!(limiter.consume("ip:2.2.2.2", 1).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_invalid_cost() {
        let limiter = InMemoryRateLimiter::new("test", 5, 60);

        assert!(matches!(
            limiter.consume("ip:1.2.3.4", 0).await,
            Err(RateLimitError::InvalidCost { cost: 0, max: 5 })
        ));
        assert!(matches!(
            limiter.consume("ip:1.2.3.4", 6).await,
            Err(RateLimitError::InvalidCost { cost: 6, max: 5 })
        ));
    }

    #[tokio::test]
    async fn failed_consume_does_not_mutate() {
        let limiter = InMemoryRateLimiter::new("test", 3, 60);

        assert!(limiter.consume("k", 2).await.unwrap());
        assert!(!limiter.consume("k", 2).await.unwrap());
        assert_eq!(limiter.remaining_tokens("k").await.unwrap(), 1);
    }
}
