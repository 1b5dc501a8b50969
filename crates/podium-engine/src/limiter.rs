//! Token Bucket Rate Limiter
//!
//! Per-key token bucket protecting the write path. Capacity refills
//! continuously; each request consumes `cost` tokens; exhaustion denies
//! admission until refill.
//!
//! ## Algorithm
//!
//! Each key owns `{tokens, last_refill}`. `consume` performs
//! read → elapsed-time refill → clamp to capacity → decide → write back
//! under one lock acquisition, so it is atomic against concurrent
//! callers on the same key (the "atomic script" of the design).
//!
//! ## Bucket Lifecycle
//!
//! Buckets are created on first use and expire after inactivity of at
//! least `capacity / refill_per_sec` seconds: an idle bucket would have
//! refilled to capacity anyway, so dropping it is indistinguishable
//! from keeping it.
//!
//! ## Instances
//!
//! The engine runs two limiters: per-user (`user:<id>`, N requests per
//! window) and per-region (`region:<code>`, burst capacity with a
//! sustained refill rate). The queue-depth admission check is separate
//! and advisory — it is not a token bucket.

use podium_core::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Tokens left after this call (unchanged when denied).
    pub remaining: f64,
    /// Seconds until enough tokens exist for a request of this cost.
    /// Zero when allowed.
    pub retry_after_secs: u64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucketLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, BucketState>>,
}

impl TokenBucketLimiter {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter admitting `tokens` requests per `window` (the per-user
    /// shape: capacity = N, refill = N / window).
    pub fn per_window(tokens: u32, window: Duration) -> Self {
        let capacity = tokens as f64;
        Self::new(capacity, capacity / window.as_secs_f64().max(f64::EPSILON))
    }

    /// Atomic check-and-consume for `key`.
    ///
    /// Fallible so remote-backed implementations can report store
    /// failures; callers apply the fail-open policy on `Err`.
    pub async fn consume(&self, key: &str, cost: f64) -> Result<RateDecision> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        // Idle expiry: an untouched bucket past full-refill time holds
        // no information. A non-refilling limiter never prunes.
        let expiry = Duration::try_from_secs_f64(self.capacity / self.refill_per_sec)
            .unwrap_or(Duration::MAX);
        buckets.retain(|_, state| now.duration_since(state.last_refill) < expiry);

        let state = buckets.entry(key.to_string()).or_insert(BucketState {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= cost {
            state.tokens -= cost;
            Ok(RateDecision {
                allowed: true,
                remaining: state.tokens,
                retry_after_secs: 0,
            })
        } else {
            let deficit = cost - state.tokens;
            Ok(RateDecision {
                allowed: false,
                remaining: state.tokens,
                retry_after_secs: (deficit / self.refill_per_sec).ceil() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn capacity_calls_admitted_then_denied() {
        let limiter = TokenBucketLimiter::new(5.0, 1.0);

        for _ in 0..5 {
            assert!(limiter.consume("user:u1", 1.0).await.unwrap().allowed);
        }

        let denied = limiter.consume("user:u1", 1.0).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs >= 1);
    }

    #[tokio::test]
    async fn refill_readmits_after_wait() {
        // 100 tokens/sec so a short sleep refills at least one token.
        let limiter = TokenBucketLimiter::new(3.0, 100.0);

        for _ in 0..3 {
            assert!(limiter.consume("k", 1.0).await.unwrap().allowed);
        }
        assert!(!limiter.consume("k", 1.0).await.unwrap().allowed);

        sleep(Duration::from_millis(20)).await;
        assert!(limiter.consume("k", 1.0).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = TokenBucketLimiter::new(1.0, 0.1);

        assert!(limiter.consume("user:a", 1.0).await.unwrap().allowed);
        assert!(!limiter.consume("user:a", 1.0).await.unwrap().allowed);
        assert!(limiter.consume("user:b", 1.0).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn refill_clamps_to_capacity() {
        let limiter = TokenBucketLimiter::new(2.0, 1000.0);

        assert!(limiter.consume("k", 1.0).await.unwrap().allowed);
        sleep(Duration::from_millis(20)).await;

        // Far more than 2 tokens' worth of refill time has passed;
        // only capacity minus cost remains after one consume.
        let d = limiter.consume("k", 1.0).await.unwrap();
        assert!(d.allowed);
        assert!(d.remaining <= 1.0 + f64::EPSILON);
    }

    #[tokio::test]
    async fn per_window_shape() {
        let limiter = TokenBucketLimiter::per_window(20, Duration::from_secs(60));

        for _ in 0..20 {
            assert!(limiter.consume("user:u1", 1.0).await.unwrap().allowed);
        }
        let denied = limiter.consume("user:u1", 1.0).await.unwrap();
        assert!(!denied.allowed);
        // 20 per 60s refills a third of a token per second.
        assert!(denied.retry_after_secs >= 1);
    }

    #[tokio::test]
    async fn denied_call_does_not_consume() {
        let limiter = TokenBucketLimiter::new(1.0, 0.001);

        assert!(limiter.consume("k", 1.0).await.unwrap().allowed);
        let before = limiter.consume("k", 1.0).await.unwrap();
        let after = limiter.consume("k", 1.0).await.unwrap();
        assert!(!before.allowed && !after.allowed);
        assert!(after.remaining >= before.remaining);
    }

    #[tokio::test]
    async fn idle_buckets_expire_back_to_full() {
        // Full refill time is 10ms, so a 30ms idle gap expires the key.
        let limiter = TokenBucketLimiter::new(1.0, 100.0);

        assert!(limiter.consume("k", 1.0).await.unwrap().allowed);
        sleep(Duration::from_millis(30)).await;

        // Touch another key to trigger pruning, then the idle key
        // behaves as a fresh full bucket.
        limiter.consume("other", 1.0).await.unwrap();
        assert!(limiter.consume("k", 1.0).await.unwrap().allowed);
    }
}
