//! Server-side token bucket rate limiting.
//!
//! `psygo/rpc/Limiter.go` wraps `golang.org/x/time/rate.Limiter`, a token
//! bucket with a configurable wait timeout; there's no vendored Rust
//! equivalent in the retrieval pack, so this reimplements the same
//! contract directly, patterned after a token bucket strategy seen
//! elsewhere in the ecosystem (elapsed-time refill, `Mutex`-guarded state)
//! but collapsed from its pluggable `TokenStore` abstraction to one
//! in-process bucket, since one limiter is meant to be shared across all
//! methods of a single server instance rather than backed by a
//! distributed counter.

use std::sync::Mutex;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::rpc::error::RpcError;
use std::sync::Arc;

struct BucketState {
    tokens: f64,
    last_refill_millis: u64,
}

/// A single shared token bucket: `rate` tokens per second, capped at
/// `burst`. Every inbound RPC calls [`TokenBucket::acquire`], which
/// blocks (polling in small steps) until a token is free or
/// `wait_timeout` elapses.
pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    wait_timeout: Duration,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64, wait_timeout: Duration) -> Self {
        Self::with_clock(rate_per_sec, burst, wait_timeout, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(rate_per_sec: f64, burst: f64, wait_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self { rate_per_sec, burst, wait_timeout, state: Mutex::new(BucketState { tokens: burst, last_refill_millis: now }), clock }
    }

    /// Acquire a single token, waiting up to `wait_timeout` for the
    /// bucket to refill. Returns [`RpcError::RateLimited`] on timeout.
    pub async fn acquire(&self) -> Result<(), RpcError> {
        let deadline = self.clock.now_millis() + self.wait_timeout.as_millis() as u64;
        loop {
            if self.try_acquire() {
                return Ok(());
            }
            if self.clock.now_millis() >= deadline {
                return Err(RpcError::RateLimited(self.wait_timeout));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        let now = self.clock.now_millis();
        let elapsed_secs = now.saturating_sub(state.last_refill_millis) as f64 / 1000.0;
        state.tokens = (state.tokens + elapsed_secs * self.rate_per_sec).min(self.burst);
        state.last_refill_millis = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run against the real `MonotonicClock` with small real delays
    // (tens of milliseconds) rather than a fake clock or Tokio's paused
    // virtual time: `acquire`'s poll loop reads `Instant::now()` directly,
    // which a paused Tokio clock does not affect, so faking it out would
    // either busy-spin or hang rather than genuinely speed the test up.

    #[tokio::test]
    async fn acquires_up_to_burst_immediately() {
        let bucket = TokenBucket::new(1.0, 3.0, Duration::from_millis(50));
        bucket.acquire().await.unwrap();
        bucket.acquire().await.unwrap();
        bucket.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn times_out_once_the_bucket_is_dry() {
        let bucket = TokenBucket::new(1.0, 1.0, Duration::from_millis(10));
        bucket.acquire().await.unwrap();

        let err = bucket.acquire().await.unwrap_err();
        assert!(matches!(err, RpcError::RateLimited(_)));
    }

    #[tokio::test]
    async fn refills_over_elapsed_time() {
        let bucket = TokenBucket::new(100.0, 1.0, Duration::from_millis(200));
        bucket.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        bucket.acquire().await.unwrap();
    }
}
