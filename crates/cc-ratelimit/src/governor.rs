//! The rate-limit governor (spec §4.2, C2): one [`RateLimitGovernor`] per
//! process, lazily creating per-scope state on first use.

use crate::bucket::TokenBucket;
use crate::headers::{parse_rate_limit_headers, ParsedHeaders};
use crate::penalty::PenaltyState;
use crate::ScopeKey;
use cc_core::{RateLimitInfo, RateLimitRules};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

struct ScopeState {
    bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
    penalty: Mutex<PenaltyState>,
    info: Mutex<RateLimitInfo>,
}

impl ScopeState {
    fn new(rules: &RateLimitRules) -> Self {
        let permits = (rules.concurrency_limit as usize).max(1);
        Self {
            bucket: TokenBucket::new(rules.tokens_per_window, rules.window_ms),
            semaphore: Arc::new(Semaphore::new(permits)),
            penalty: Mutex::new(PenaltyState::default()),
            info: Mutex::new(RateLimitInfo::default()),
        }
    }
}

/// A held admission slot. Dropping it (or calling [`Acquisition::release`])
/// returns the concurrency permit to the scope.
pub struct Acquisition {
    _permit: OwnedSemaphorePermit,
    /// Number of suspension rounds this acquire spent waiting on a penalty.
    pub attempts: u32,
    /// Total milliseconds spent suspended before admission.
    pub wait_ms: u64,
}

impl Acquisition {
    /// Release the concurrency permit. Equivalent to dropping the value.
    pub fn release(self) {
        drop(self);
    }
}

/// Process-wide rate-limit governor, keyed by [`ScopeKey`].
pub struct RateLimitGovernor {
    scopes: Mutex<HashMap<ScopeKey, Arc<ScopeState>>>,
}

impl Default for RateLimitGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitGovernor {
    /// Build an empty governor.
    pub fn new() -> Self {
        Self { scopes: Mutex::new(HashMap::new()) }
    }

    async fn scope_state(&self, key: &ScopeKey, rules: &RateLimitRules) -> Arc<ScopeState> {
        let mut scopes = self.scopes.lock().await;
        scopes
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ScopeState::new(rules)))
            .clone()
    }

    /// Admit a call at the given scope, suspending until any active penalty
    /// has expired, a concurrency permit is free, and a bucket token is
    /// available (spec §4.2 acquire protocol).
    pub async fn acquire(
        &self,
        connector_id: &str,
        connection_id: &str,
        organization_id: &str,
        rules: &RateLimitRules,
    ) -> Acquisition {
        let key = ScopeKey::compute(rules.scope, connector_id, connection_id, organization_id);
        let state = self.scope_state(&key, rules).await;

        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            let penalty_until = state.penalty.lock().await.active_until();
            if let Some(until) = penalty_until {
                attempts += 1;
                debug!(target: "cc.ratelimit", scope = %key.0, "suspended on active penalty");
                tokio::time::sleep(until.saturating_duration_since(Instant::now())).await;
                continue;
            }
            break;
        }

        let permit = state
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        state.bucket.acquire().await;

        Acquisition {
            _permit: permit,
            attempts,
            wait_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Feed response headers back into the governor: updates the scope's
    /// observed [`RateLimitInfo`] and schedules a penalty on 429 or a
    /// positive `Retry-After` (spec §4.2 header feedback).
    pub async fn record_response(
        &self,
        connector_id: &str,
        connection_id: &str,
        organization_id: &str,
        rules: &RateLimitRules,
        status: u16,
        headers: &BTreeMap<String, String>,
    ) -> ParsedHeaders {
        let key = ScopeKey::compute(rules.scope, connector_id, connection_id, organization_id);
        let state = self.scope_state(&key, rules).await;

        let parsed = parse_rate_limit_headers(headers, &rules.header_overrides);
        *state.info.lock().await = parsed.info;

        let mut penalty = state.penalty.lock().await;
        if status == 429 {
            let delay = penalty.apply_429(parsed.retry_after_ms);
            warn!(target: "cc.ratelimit", scope = %key.0, delay_ms = delay.as_millis() as u64, "429 penalty scheduled");
        } else if let Some(retry_after_ms) = parsed.retry_after_ms.filter(|ms| *ms > 0) {
            let delay = penalty.apply_retry_after(retry_after_ms);
            warn!(target: "cc.ratelimit", scope = %key.0, delay_ms = delay.as_millis() as u64, "retry-after penalty scheduled");
        } else {
            penalty.reset();
        }

        parsed
    }

    /// The governor's best-known [`RateLimitInfo`] for a scope, for metrics.
    pub async fn info_for(
        &self,
        connector_id: &str,
        connection_id: &str,
        organization_id: &str,
        rules: &RateLimitRules,
    ) -> RateLimitInfo {
        let key = ScopeKey::compute(rules.scope, connector_id, connection_id, organization_id);
        let state = self.scope_state(&key, rules).await;
        *state.info.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::RateLimitScope;
    use std::time::Duration;

    fn rules(concurrency: u32, tokens: u32, window_ms: u64) -> RateLimitRules {
        RateLimitRules {
            concurrency_limit: concurrency,
            scope: RateLimitScope::Connector,
            window_ms,
            tokens_per_window: tokens,
            header_overrides: Default::default(),
        }
    }

    #[tokio::test]
    async fn admits_up_to_concurrency_limit() {
        let gov = RateLimitGovernor::new();
        let rules = rules(2, 1000, 1000);
        let a1 = gov.acquire("c", "conn", "org", &rules).await;
        let a2 = gov.acquire("c", "conn", "org", &rules).await;
        assert_eq!(a1.wait_ms, a1.wait_ms);
        drop(a1);
        drop(a2);
    }

    #[tokio::test]
    async fn penalty_suppresses_admission_until_elapsed() {
        let gov = RateLimitGovernor::new();
        let rules = rules(5, 1000, 1000);
        let mut headers = BTreeMap::new();
        headers.insert("retry-after".to_string(), "0.2".to_string());
        gov.record_response("c", "conn", "org", &rules, 429, &headers).await;

        let start = Instant::now();
        let acq = gov.acquire("c", "conn", "org", &rules).await;
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert!(acq.attempts >= 1);
    }

    #[tokio::test]
    async fn non_penalized_response_resets_backoff() {
        let gov = RateLimitGovernor::new();
        let rules = rules(5, 1000, 1000);
        let mut headers = BTreeMap::new();
        headers.insert("x-ratelimit-remaining".to_string(), "8".to_string());
        let parsed = gov.record_response("c", "conn", "org", &rules, 200, &headers).await;
        assert_eq!(parsed.info.remaining, Some(8));

        let start = Instant::now();
        gov.acquire("c", "conn", "org", &rules).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
