//! Unified error taxonomy for the connector execution core.
//!
//! Every failure that crosses the request pipeline carries an [`ErrorKind`] —
//! a stable, machine-readable tag distinguishing transient vendor failures
//! from permanent ones — a human-readable message, the upstream HTTP status
//! (if one was observed), and arbitrary structured context. Adapters and the
//! pipeline convert [`ConnectorError`] into the uniform response envelope at
//! the boundary; it never escapes as a Rust panic.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Taxonomy of failures a connector call can produce (see spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing required parameter, schema mismatch, malformed identifier.
    Validation,
    /// Missing credentials, or a 401/403 from the vendor.
    Auth,
    /// The organization's network allowlist rejected the resolved host.
    NetworkBlocked,
    /// 429, or an explicit `Retry-After` header.
    RateLimited,
    /// 5xx response, or a transport failure before any status was observed.
    TransientHttp,
    /// A non-401/403/429 4xx response.
    PermanentHttp,
    /// The OAuth token refresh call itself failed.
    RefreshFailed,
    /// Caller-initiated cancellation.
    Canceled,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Stable `&'static str` representation (e.g. `"RATE_LIMITED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Auth => "AUTH",
            Self::NetworkBlocked => "NETWORK_BLOCKED",
            Self::RateLimited => "RATE_LIMITED",
            Self::TransientHttp => "TRANSIENT_HTTP",
            Self::PermanentHttp => "PERMANENT_HTTP",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::Canceled => "CANCELED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the default retry predicate (spec §4.4, §8 property 4) should
    /// retry a failure of this kind. Final say still lives with the caller's
    /// `statusCode`-based predicate; this is a coarse default for kinds that
    /// never carry a status code (e.g. [`ErrorKind::NetworkBlocked`]).
    pub fn is_retriable_by_default(&self) -> bool {
        matches!(self, Self::RateLimited | Self::TransientHttp)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConnectorError
// ---------------------------------------------------------------------------

/// Unified connector error.
///
/// # Builder usage
///
/// ```
/// use cc_error::{ConnectorError, ErrorKind};
///
/// let err = ConnectorError::new(ErrorKind::TransientHttp, "upstream 503")
///     .with_status(503)
///     .with_context("connector", "asana");
/// ```
pub struct ConnectorError {
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Upstream HTTP status code, if one was observed before failing.
    pub status_code: Option<u16>,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ConnectorError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for a [`ErrorKind::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Shorthand for a [`ErrorKind::Auth`] error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// Shorthand for a [`ErrorKind::NetworkBlocked`] error.
    pub fn network_blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkBlocked, message)
    }

    /// Attach the observed upstream status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Attach a key-value pair to the diagnostic context. The value is
    /// converted via [`serde_json::to_value`]; if serialization fails the
    /// entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the default retry policy should retry this error (spec §4.4):
    /// `statusCode ∈ {0, 429} ∪ [500, 599]`, or no status observed and the
    /// kind defaults to retriable.
    pub fn is_retriable(&self) -> bool {
        match self.status_code {
            Some(code) => code == 429 || (500..600).contains(&code),
            None => self.kind.is_retriable_by_default(),
        }
    }
}

impl fmt::Debug for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ConnectorError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(code) = self.status_code {
            d.field("status_code", &code);
        }
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (status={code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConnectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Build a [`ConnectorError::Unknown`] from any `std::error::Error`, matching
/// the fallback in spec §7 ("anything else ... `error = getErrorMessage(e)`").
impl From<anyhow::Error> for ConnectorError {
    fn from(e: anyhow::Error) -> Self {
        ConnectorError::new(ErrorKind::Unknown, e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Serialization support (the JSON boundary — spec §9 "preserve the string
// form on the JSON boundary")
// ---------------------------------------------------------------------------

/// Serializable snapshot of a [`ConnectorError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectorErrorDto {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Upstream status code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ConnectorError> for ConnectorErrorDto {
    fn from(err: &ConnectorError) -> Self {
        Self {
            kind: err.kind,
            message: err.message.clone(),
            status_code: err.status_code,
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}
