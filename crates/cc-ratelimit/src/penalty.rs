//! Penalty scheduling on HTTP 429 / `Retry-After` (spec §4.2).

use rand::Rng;
use std::time::{Duration, Instant};

const MAX_BACKOFF_LEVEL: u32 = 6;
const MAX_DELAY_MS: u64 = 60_000;

/// Per-scope penalty and backoff-level state.
#[derive(Debug, Default)]
pub struct PenaltyState {
    backoff_level: u32,
    until: Option<Instant>,
}

impl PenaltyState {
    /// The instant the current penalty expires, if one is active.
    pub fn active_until(&self) -> Option<Instant> {
        self.until.filter(|&at| at > Instant::now())
    }

    /// Apply a penalty following an HTTP 429 response.
    pub fn apply_429(&mut self, retry_after_ms: Option<u64>) -> Duration {
        self.backoff_level = (self.backoff_level + 1).min(MAX_BACKOFF_LEVEL);
        self.schedule(retry_after_ms)
    }

    /// Apply a penalty following a non-429 response that still carried a
    /// positive `Retry-After`.
    pub fn apply_retry_after(&mut self, retry_after_ms: u64) -> Duration {
        self.backoff_level = self.backoff_level.max(1);
        self.schedule(Some(retry_after_ms))
    }

    /// Clear the backoff level after a response that wasn't penalized.
    pub fn reset(&mut self) {
        self.backoff_level = 0;
        self.until = None;
    }

    fn schedule(&mut self, retry_after_ms: Option<u64>) -> Duration {
        let base_ms = retry_after_ms.unwrap_or_else(|| {
            MAX_DELAY_MS.min(1000u64.saturating_mul(1u64 << (self.backoff_level.saturating_sub(1))))
        });
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        let delay = Duration::from_millis(((base_ms as f64) * jitter) as u64);
        self.until = Some(Instant::now() + delay);
        delay
    }
}
