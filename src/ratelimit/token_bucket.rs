//! Token bucket rate limiter (spec §4.1).
//!
//! Grounded on `dome_tracker.rs`'s `DomeClient::rate_limited_request`, which tracks a
//! single `last_request: Arc<Mutex<Option<Instant>>>` and sleeps out the remaining delay
//! before each call. This generalizes that per-instance cooldown into a continuous-refill
//! bucket with burst capacity, since the spec needs distinct hot/cold budgets shared across
//! many wallets rather than one fixed inter-call gap.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

struct State {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<State>,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            rate_per_sec,
            burst,
            state: Mutex::new(State { tokens: burst, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, state: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
        state.last_refill = now;
    }

    /// Consumes one token, sleeping until one is available. Distinct bucket instances per
    /// worker class (hot/cold) give each its own budget against the upstream HTTP surface.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.rate_per_sec))
                }
            };

            match wait {
                None => return,
                Some(d) => sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_consumed_without_sleeping() {
        let bucket = TokenBucket::new(10.0, 5.0);
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn exhausted_burst_forces_a_wait() {
        let bucket = TokenBucket::new(100.0, 1.0);
        bucket.acquire().await;
        let start = Instant::now();
        bucket.acquire().await;
        // At 100/s a single token refills in ~10ms; assert we actually waited, not spun.
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
