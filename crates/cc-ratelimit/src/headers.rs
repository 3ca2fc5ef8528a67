//! Vendor rate-limit header parsing (spec §4.2).

use cc_core::{RateLimitHeaderOverrides, RateLimitInfo};
use std::collections::BTreeMap;

const DEFAULT_LIMIT_HEADERS: &[&str] = &["x-ratelimit-limit", "x-rate-limit-limit", "ratelimit-limit"];
const DEFAULT_REMAINING_HEADERS: &[&str] =
    &["x-ratelimit-remaining", "x-rate-limit-remaining", "ratelimit-remaining"];
const DEFAULT_RESET_HEADERS: &[&str] = &["x-ratelimit-reset", "x-rate-limit-reset", "ratelimit-reset"];
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Header-derived rate-limit state plus any retry delay the vendor requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeaders {
    /// The derived `RateLimitInfo` for this response.
    pub info: RateLimitInfo,
    /// Requested delay before the next attempt, if `Retry-After` was present.
    pub retry_after_ms: Option<u64>,
}

fn find(headers: &BTreeMap<String, String>, override_name: &Option<String>, defaults: &[&str]) -> Option<String> {
    if let Some(name) = override_name {
        if let Some(v) = headers.get(&name.to_lowercase()) {
            return Some(v.clone());
        }
    }
    defaults.iter().find_map(|name| headers.get(*name).cloned())
}

/// Parse `X-RateLimit-*` / `RateLimit-*` / `Retry-After` headers into
/// [`ParsedHeaders`], applying per-connector overrides first.
///
/// Expects `headers` to already be lower-cased keys (spec: every envelope's
/// `headers` map is lower-cased).
pub fn parse_rate_limit_headers(
    headers: &BTreeMap<String, String>,
    overrides: &RateLimitHeaderOverrides,
) -> ParsedHeaders {
    let limit = find(headers, &overrides.limit, DEFAULT_LIMIT_HEADERS).and_then(|v| v.parse::<u64>().ok());
    let remaining =
        find(headers, &overrides.remaining, DEFAULT_REMAINING_HEADERS).and_then(|v| v.parse::<u64>().ok());
    let reset_time = find(headers, &overrides.reset, DEFAULT_RESET_HEADERS).and_then(|v| parse_reset(&v));

    let retry_after_ms = override_or_default_retry_after(headers, overrides);

    ParsedHeaders {
        info: RateLimitInfo { limit, remaining, reset_time },
        retry_after_ms,
    }
}

fn override_or_default_retry_after(
    headers: &BTreeMap<String, String>,
    overrides: &RateLimitHeaderOverrides,
) -> Option<u64> {
    let raw = if let Some(name) = &overrides.retry_after {
        headers.get(&name.to_lowercase()).cloned()
    } else {
        None
    }
    .or_else(|| headers.get(RETRY_AFTER_HEADER).cloned())?;
    parse_retry_after(&raw)
}

/// Interpret a `Reset` header value per the magnitude heuristic in spec §4.2.
fn parse_reset(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.trim().parse::<f64>() {
        let now_ms = now_epoch_ms();
        let abs_ms = if n > 1e12 {
            n as i64
        } else if n > 1e9 {
            (n * 1000.0) as i64
        } else if n >= 1e6 {
            now_ms + n as i64
        } else if n >= 0.0 {
            now_ms + (n * 1000.0) as i64
        } else {
            return None;
        };
        return Some(abs_ms);
    }
    parse_http_date(raw)
}

/// Interpret a `Retry-After` value: numeric seconds, else an HTTP-date
/// converted to a relative millisecond delay from now.
pub fn parse_retry_after(raw: &str) -> Option<u64> {
    if let Ok(secs) = raw.trim().parse::<f64>() {
        if secs < 0.0 {
            return None;
        }
        return Some((secs * 1000.0) as u64);
    }
    let abs_ms = parse_http_date(raw)?;
    let delta = abs_ms - now_epoch_ms();
    Some(delta.max(0) as u64)
}

fn parse_http_date(raw: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
