//! Token-bucket rate limiting for outbound requests.
//!
//! One bucket per client, shared across all worker tasks. Acquisition is
//! FIFO-fair: the bucket state sits behind a fair async mutex and a waiter
//! sleeps while holding it, so later arrivals cannot jump the queue.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default request budget per minute against the source tenant.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 300;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Async token bucket. Capacity equals the per-minute budget; tokens refill
/// continuously.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    tokens_per_sec: f64,
}

impl RateLimiter {
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self {
            state: Mutex::new(BucketState {
                tokens: requests as f64,
                last_refill: Instant::now(),
            }),
            capacity: requests as f64,
            tokens_per_sec: requests as f64 / 60.0,
        }
    }

    /// Block until a token is available, then consume it.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        if state.tokens < 1.0 {
            let deficit = 1.0 - state.tokens;
            let wait = Duration::from_secs_f64(deficit / self.tokens_per_sec);
            tokio::time::sleep(wait).await;
            self.refill(&mut state);
        }
        state.tokens = (state.tokens - 1.0).max(0.0);
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.tokens_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}
