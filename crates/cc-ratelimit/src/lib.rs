//! Per-scope rate-limit governor: token bucket, concurrency semaphore, and
//! 429/`Retry-After` penalty scheduling.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod governor;
mod headers;
mod penalty;

pub use governor::{Acquisition, RateLimitGovernor};
pub use headers::{parse_rate_limit_headers, parse_retry_after, ParsedHeaders};
pub use penalty::PenaltyState;

/// Key identifying one rate-limit scope instance: the scope tag plus the
/// concrete id it resolves to (connector id, connection id, or org id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeKey(pub String);

impl ScopeKey {
    /// Build the scope key for one call, given its three identifiers and the
    /// configured [`cc_core::RateLimitScope`].
    pub fn compute(
        scope: cc_core::RateLimitScope,
        connector_id: &str,
        connection_id: &str,
        organization_id: &str,
    ) -> Self {
        use cc_core::RateLimitScope::*;
        let id = match scope {
            Connector => connector_id,
            Connection => connection_id,
            Organization => organization_id,
        };
        ScopeKey(format!("{scope:?}:{id}"))
    }
}
