//! Process-global token-bucket rate limiter
//!
//! One bucket for the whole gateway. Tokens refill steadily at `rpm / 60`
//! per second and the burst cap is `2 × rpm`. Acquire and refill happen
//! under one short critical section so concurrent callers never observe a
//! partially updated bucket.

use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug)]
struct BucketState {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

/// Shared token bucket. Cheap to clone behind an `Arc`.
pub struct TokenBucket {
    inner: Mutex<BucketState>,
    requests_per_minute: Mutex<u32>,
}

/// Snapshot for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct TokenBucketStatus {
    pub requests_per_minute: u32,
    pub capacity: f64,
    pub available: f64,
}

impl TokenBucket {
    /// Create a bucket for the given requests-per-minute limit.
    /// Burst capacity is twice the per-minute limit.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = (requests_per_minute as f64) * 2.0;
        Self {
            inner: Mutex::new(BucketState {
                capacity,
                tokens: capacity,
                refill_per_sec: requests_per_minute as f64 / 60.0,
                last_refill: Instant::now(),
            }),
            requests_per_minute: Mutex::new(requests_per_minute),
        }
    }

    /// Try to take one token. Returns false when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.inner.lock();

        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * state.refill_per_sec).min(state.capacity);
        state.last_refill = now;

        if state.tokens < 1.0 {
            return false;
        }
        state.tokens -= 1.0;
        true
    }

    /// Swap in a new per-minute limit without losing accumulated tokens
    /// beyond the new capacity.
    pub fn update_config(&self, requests_per_minute: u32) {
        let mut state = self.inner.lock();
        state.capacity = (requests_per_minute as f64) * 2.0;
        state.refill_per_sec = requests_per_minute as f64 / 60.0;
        state.tokens = state.tokens.min(state.capacity);
        *self.requests_per_minute.lock() = requests_per_minute;
        tracing::info!(requests_per_minute, "rate limiter reconfigured");
    }

    pub fn status(&self) -> TokenBucketStatus {
        let state = self.inner.lock();
        TokenBucketStatus {
            requests_per_minute: *self.requests_per_minute.lock(),
            capacity: state.capacity,
            available: state.tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exactly_capacity_acquires_succeed() {
        // Capacity is 2 × rpm; within one refill interval exactly that many
        // acquires succeed and the rest fail.
        let bucket = TokenBucket::new(5); // capacity 10
        let now = Instant::now();

        let granted = (0..25).filter(|_| bucket.try_acquire_at(now)).count();
        assert_eq!(granted, 10);
        assert!(!bucket.try_acquire_at(now));
    }

    #[test]
    fn test_refill_restores_tokens() {
        let bucket = TokenBucket::new(60); // 1 token per second, capacity 120
        let start = Instant::now();

        for _ in 0..120 {
            assert!(bucket.try_acquire_at(start));
        }
        assert!(!bucket.try_acquire_at(start));

        // After 5 simulated seconds, 5 tokens are back.
        let later = start + Duration::from_secs(5);
        let granted = (0..10).filter(|_| bucket.try_acquire_at(later)).count();
        assert_eq!(granted, 5);
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let bucket = TokenBucket::new(2); // capacity 4
        let start = Instant::now();
        let much_later = start + Duration::from_secs(3600);

        let granted = (0..100).filter(|_| bucket.try_acquire_at(much_later)).count();
        assert_eq!(granted, 4);
    }

    #[test]
    fn test_update_config_clamps_tokens() {
        let bucket = TokenBucket::new(60);
        bucket.update_config(1); // capacity drops to 2
        let status = bucket.status();
        assert_eq!(status.capacity, 2.0);
        assert!(status.available <= 2.0);
    }
}
