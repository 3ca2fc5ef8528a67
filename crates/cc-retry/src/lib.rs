//! Generic retry-with-backoff combinator over connector envelopes (spec §4.4,
//! C4).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cc_core::ApiResponse;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default retry predicate (spec §4.4, §8 property 4): retry iff the
/// envelope failed with `statusCode ∈ {0, 429} ∪ [500, 599]`.
pub fn default_should_retry<T>(resp: &ApiResponse<T>) -> bool {
    if resp.success {
        return false;
    }
    match resp.status_code {
        Some(0) | Some(429) => true,
        Some(code) => (500..600).contains(&code),
        None => false,
    }
}

/// Configuration for [`with_retries`].
pub struct RetryPolicy<T> {
    /// Maximum number of retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Delay ceiling.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay on each subsequent retry.
    pub backoff_multiplier: f64,
    /// Decides whether a given envelope should be retried.
    pub should_retry: Box<dyn Fn(&ApiResponse<T>) -> bool + Send + Sync>,
    /// Called before each backoff sleep, with the zero-indexed attempt that
    /// just failed and the delay about to be applied.
    pub on_retry: Option<Box<dyn Fn(u32, &ApiResponse<T>, Duration) + Send + Sync>>,
}

impl<T> Default for RetryPolicy<T> {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            should_retry: Box::new(default_should_retry),
            on_retry: None,
        }
    }
}

/// Compute the backoff delay before attempt `k` (`k ≥ 1`, the attempt that is
/// about to run). No jitter at this layer — jitter belongs to the rate
/// governor's penalty scheduling.
pub fn compute_delay<T>(policy: &RetryPolicy<T>, k: u32) -> Duration {
    let factor = policy.backoff_multiplier.powi(k.saturating_sub(1) as i32);
    let ms = (policy.initial_delay_ms as f64 * factor) as u64;
    Duration::from_millis(ms.min(policy.max_delay_ms))
}

/// Run `op` with exponential backoff, retrying per `policy.should_retry`.
///
/// `op` must already return `ApiResponse<T>` — the envelope-totality
/// invariant (spec §8 property 1) means there is nothing left to "catch"
/// by the time control reaches this combinator.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy<T>, mut op: F) -> ApiResponse<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResponse<T>>,
{
    let max_attempts = policy.retries + 1;
    let mut last = None;

    for attempt in 0..max_attempts {
        let resp = op().await;
        let retry_eligible = !resp.success && (policy.should_retry)(&resp);
        let is_last = attempt + 1 >= max_attempts;

        if !retry_eligible || is_last {
            return resp;
        }

        let delay = compute_delay(policy, attempt + 1);
        warn!(target: "cc.retry", attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
        if let Some(on_retry) = &policy.on_retry {
            on_retry(attempt, &resp, delay);
        }
        last = Some(resp);
        debug!(target: "cc.retry", attempt, "sleeping before retry");
        tokio::time::sleep(delay).await;
    }

    // Unreachable in practice: the loop always returns on its last iteration.
    last.unwrap_or_else(|| ApiResponse::transport_error("retry loop exhausted without an attempt"))
}
