// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured telemetry and metrics collection for connector calls.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// CallMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single pipeline call (spec §4.1/§4.2/§4.4: one
/// `request`/`makeRequest` invocation, including any retries and rate-limit
/// suspension it incurred).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallMetrics {
    /// Connector id the call was made against.
    pub connector_id: String,
    /// Dispatched operation id.
    pub operation_id: String,
    /// Wall-clock duration in milliseconds, including retries and
    /// rate-limit suspension.
    pub duration_ms: u64,
    /// Observed HTTP status, or `0` for a transport failure.
    pub status_code: u16,
    /// Whether the call ultimately succeeded.
    pub success: bool,
    /// Number of retry attempts taken beyond the first.
    pub retry_count: u32,
    /// Milliseconds spent suspended on the rate governor before admission.
    pub rate_limit_wait_ms: u64,
    /// Error kind tag, present on failure (spec §7 `ErrorKind`).
    pub error_kind: Option<String>,
}

// ---------------------------------------------------------------------------
// MetricsSummary
// ---------------------------------------------------------------------------

/// Aggregated statistics across multiple recorded calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of calls recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Total retry attempts across all calls.
    pub total_retries: u64,
    /// Total milliseconds spent suspended on the rate governor.
    pub total_rate_limit_wait_ms: u64,
    /// Error rate (failed calls / total calls).
    pub error_rate: f64,
    /// Per-connector call counts (deterministic ordering).
    pub connector_counts: BTreeMap<String, usize>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            total_retries: 0,
            total_rate_limit_wait_ms: 0,
            error_rate: 0.0,
            connector_counts: BTreeMap::new(),
        }
    }
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector for call metrics.
///
/// Wrap in an `Arc` to share across threads (the inner storage is already
/// behind a `Mutex`).
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<CallMetrics>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new, empty collector.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Record one completed call's metrics.
    pub fn record(&self, metrics: CallMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Return all recorded call metrics.
    pub fn calls(&self) -> Vec<CallMetrics> {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.clone()
    }

    /// Number of calls recorded so far.
    pub fn len(&self) -> usize {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.len()
    }

    /// Whether the collector has no recorded calls.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded calls.
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let total_retries: u64 = data.iter().map(|r| r.retry_count as u64).sum();
        let total_rate_limit_wait_ms: u64 = data.iter().map(|r| r.rate_limit_wait_ms).sum();

        let failures = data.iter().filter(|r| !r.success).count() as f64;
        let error_rate = failures / count as f64;

        let mut connector_counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in data.iter() {
            *connector_counts.entry(r.connector_id.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            total_retries,
            total_rate_limit_wait_ms,
            error_rate,
            connector_counts,
        }
    }

    /// Clear all recorded metrics.
    pub fn clear(&self) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.clear();
    }
}

// ---------------------------------------------------------------------------
// TelemetrySpan
// ---------------------------------------------------------------------------

/// A structured span for tracing integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySpan {
    /// Span name / operation.
    pub name: String,
    /// Arbitrary key-value attributes (deterministic ordering).
    pub attributes: BTreeMap<String, String>,
}

impl TelemetrySpan {
    /// Create a new span with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: BTreeMap::new() }
    }

    /// Insert an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Emit the span via `tracing::info!`.
    pub fn emit(&self) {
        info!(span_name = %self.name, attributes = ?self.attributes, "telemetry_span");
    }
}

// ---------------------------------------------------------------------------
// TelemetryExporter
// ---------------------------------------------------------------------------

/// Trait for exporting collected metrics.
pub trait TelemetryExporter: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &MetricsSummary) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl TelemetryExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}
