//! The uniform response envelope (spec §3 `APIResponse<T>`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Uniform envelope returned by every transport call, every paginator, and
/// every adapter operation.
///
/// Invariants (spec §3):
/// - `success == true` implies `status_code` is in `[200, 299]`, or was
///   built explicitly by an adapter that knows better.
/// - `success == false` implies `error` is non-empty.
/// - `status_code == Some(0)` means "transport failure before any HTTP
///   status was observed" and is treated as retriable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T = serde_json::Value> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Response payload, present on success (and sometimes attached to
    /// failures that parsed a JSON error body).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable error description. Non-empty iff `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Observed HTTP status code, or `0` for a transport failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response headers, lower-cased keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl<T> ApiResponse<T> {
    /// Build a success envelope.
    pub fn ok(data: T, status_code: u16, headers: BTreeMap<String, String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code: Some(status_code),
            headers: Some(headers),
        }
    }

    /// Build a failure envelope with an observed HTTP status.
    pub fn failure(error: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code: Some(status_code),
            headers: None,
        }
    }

    /// Build a failure envelope carrying a parsed error body.
    pub fn failure_with_data(error: impl Into<String>, status_code: u16, data: T) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(error.into()),
            status_code: Some(status_code),
            headers: None,
        }
    }

    /// Build a transport-failure envelope (`statusCode = 0`, retriable).
    pub fn transport_error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code: Some(0),
            headers: None,
        }
    }

    /// Build the canonical cancellation envelope (spec §5: `{success:false,
    /// error:"canceled", statusCode:0}`), never retried.
    pub fn canceled() -> Self {
        Self::transport_error("canceled")
    }

    /// Returns `true` if this envelope satisfies the spec §3 invariants.
    pub fn is_well_formed(&self) -> bool {
        if self.success {
            matches!(self.status_code, Some(200..=299) | None)
        } else {
            self.error.as_ref().is_some_and(|e| !e.is_empty())
        }
    }

    /// Map the payload, preserving success/error/status/headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            status_code: self.status_code,
            headers: self.headers,
        }
    }
}

/// Rate-limit state derived from the most recent response for a scope (spec
/// §3 `RateLimitInfo`). Recreated on every response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Total budget for the current window, if the vendor reported one.
    pub limit: Option<u64>,
    /// Remaining calls in the current window.
    pub remaining: Option<u64>,
    /// Epoch-ms timestamp at which the window resets.
    pub reset_time: Option<i64>,
}

impl RateLimitInfo {
    /// Returns `true` if the vendor reported zero remaining calls.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}
