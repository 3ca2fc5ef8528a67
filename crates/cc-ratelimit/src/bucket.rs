//! Token bucket: refills continuously at `tokens_per_window / window_ms`.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct BucketState {
    tokens: f64,
    capacity: f64,
    refill_per_ms: f64,
    last_refill: Instant,
}

/// A continuously-refilling token bucket shared by every caller at one scope.
pub struct TokenBucket {
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Build a bucket that grants `tokens_per_window` tokens every `window_ms`.
    pub fn new(tokens_per_window: u32, window_ms: u64) -> Self {
        let window_ms = window_ms.max(1) as f64;
        let capacity = tokens_per_window as f64;
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                capacity,
                refill_per_ms: capacity / window_ms,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Block until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.refill();
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    let ms = (deficit / state.refill_per_ms).ceil().max(1.0);
                    Some(Duration::from_millis(ms as u64))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

impl BucketState {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.last_refill).as_millis() as f64;
        if elapsed_ms <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
        self.last_refill = now;
    }
}
