//! Dynamic-option results (spec §3 `DynamicOptionResult`, §4.8).

use serde::{Deserialize, Serialize};

/// A single `{value,label}` entry surfaced in a form field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicOption {
    /// The value submitted when this option is chosen.
    pub value: serde_json::Value,
    /// Human-readable label.
    pub label: String,
    /// Extra vendor data carried alongside the option, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl DynamicOption {
    /// Build an option from string value/label.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: serde_json::Value::String(value.into()),
            label: label.into(),
            data: None,
        }
    }
}

/// Result of resolving a dynamic-option field (spec §3, §4.8 step 5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicOptionResult {
    /// Whether resolution succeeded.
    pub success: bool,
    /// Resolved options, in vendor order.
    #[serde(default)]
    pub options: Vec<DynamicOption>,
    /// Opaque cursor for the next page, if the vendor paginates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Total count, if the vendor reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether this result was served from the dynamic-options cache
    /// (spec end-to-end scenario S5: "returns cached result with
    /// `cached:true`").
    #[serde(default)]
    pub cached: bool,
}

impl DynamicOptionResult {
    /// Build a success result.
    pub fn ok(options: Vec<DynamicOption>) -> Self {
        Self {
            success: true,
            options,
            next_cursor: None,
            total_count: None,
            error: None,
            cached: false,
        }
    }

    /// Build a failure result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            options: Vec::new(),
            next_cursor: None,
            total_count: None,
            error: Some(error.into()),
            cached: false,
        }
    }

    /// Mark this result as served from cache.
    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}
