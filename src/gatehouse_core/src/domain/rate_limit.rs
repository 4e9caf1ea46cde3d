use serde::{Deserialize, Serialize};

/// Persisted token-bucket state. Refill is computed lazily in whole
/// elapsed intervals; the struct itself never observes a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketState {
    pub count: u32,
    pub refilled_at: i64,
}

impl BucketState {
    /// Projects the balance at `now` without mutating: one token per whole
    /// refill interval elapsed since the last refill, capped at `max`.
    pub fn refilled_count(&self, max: u32, refill_interval_seconds: u64, now: i64) -> u32 {
        let elapsed = (now - self.refilled_at).max(0) as u64;
        let refill = elapsed / refill_interval_seconds;
        self.count
            .saturating_add(refill.min(u64::from(max)) as u32)
            .min(max)
    }

    /// Attempts to debit `cost` from the projected balance. Returns the new
    /// state on success, or `None` when the balance is short - in which case
    /// the caller must leave the stored state untouched.
    pub fn debit(
        &self,
        max: u32,
        refill_interval_seconds: u64,
        now: i64,
        cost: u32,
    ) -> Option<BucketState> {
        let available = self.refilled_count(max, refill_interval_seconds, now);
        if available < cost {
            return None;
        }
        Some(BucketState {
            count: available - cost,
            refilled_at: now,
        })
    }

    /// Cache TTL for the stored state: the key may expire once the bucket
    /// would be fully refilled and idle.
    pub fn expiry_seconds(&self, max: u32, refill_interval_seconds: u64) -> u64 {
        u64::from(max.saturating_sub(self.count)) * refill_interval_seconds
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    const MAX: u32 = 5;
    const INTERVAL: u64 = 60;

    #[test]
    fn five_consumptions_succeed_then_sixth_fails_within_interval() {
        let now = 1_000;
        let mut state = BucketState {
            count: MAX,
            refilled_at: now,
        };

        for _ in 0..MAX {
            state = state.debit(MAX, INTERVAL, now, 1).expect("token available");
        }
        assert_eq!(state.count, 0);
        assert_eq!(state.debit(MAX, INTERVAL, now + 59, 1), None);
    }

    #[test]
    fn one_token_returns_after_a_full_interval() {
        let now = 1_000;
        let empty = BucketState {
            count: 0,
            refilled_at: now,
        };

        let after = empty
            .debit(MAX, INTERVAL, now + i64::try_from(INTERVAL).unwrap(), 1)
            .expect("one interval refills one token");
        assert_eq!(after.count, 0);
    }

    #[test]
    fn refill_is_capped_at_max() {
        let state = BucketState {
            count: 2,
            refilled_at: 0,
        };
        assert_eq!(state.refilled_count(MAX, INTERVAL, 1_000_000), MAX);
    }

    #[test]
    fn failed_debit_does_not_change_state() {
        let state = BucketState {
            count: 1,
            refilled_at: 500,
        };
        assert_eq!(state.debit(MAX, INTERVAL, 510, 3), None);
        assert_eq!(state.count, 1);
        assert_eq!(state.refilled_at, 500);
    }

    #[test]
    fn expiry_covers_full_refill() {
        let state = BucketState {
            count: 2,
            refilled_at: 0,
        };
        assert_eq!(state.expiry_seconds(MAX, INTERVAL), 180);
    }

    #[quickcheck]
    fn count_stays_within_bounds(count: u32, elapsed: u32, cost: u32) -> bool {
        let max = MAX;
        let state = BucketState {
            count: count % (max + 1),
            refilled_at: 0,
        };
        let now = i64::from(elapsed);
        let projected = state.refilled_count(max, INTERVAL, now);
        if projected > max {
            return false;
        }
        match state.debit(max, INTERVAL, now, cost % (max + 1)) {
            Some(next) => next.count <= max,
            None => true,
        }
    }
}
