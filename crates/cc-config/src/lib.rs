// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the connector runtime.
//!
//! This crate provides [`ServiceConfig`] — the top-level runtime settings
//! described in spec §6.6 — together with helpers for loading from TOML
//! files, applying environment overrides, merging overlays, and producing
//! advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use cc_core::{RateLimitHeaderOverrides, RateLimitRules, RateLimitScope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A connector has no rate-limit rules configured and will run
    /// permissively (spec §4.2: "If no rules are configured, the governor
    /// is permissive").
    NoRateLimitRules {
        /// Connector id.
        connector_id: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::NoRateLimitRules { connector_id } => {
                write!(f, "connector '{connector_id}' has no rate-limit rules; governor will run permissively")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Deployment environment (spec §6.6 `NODE_ENV`).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Production deployment.
    Production,
    /// Automated test runs.
    Test,
}

impl Environment {
    /// Parse from the raw `NODE_ENV` string value, defaulting to
    /// [`Environment::Development`] on anything unrecognized.
    pub fn from_node_env(value: &str) -> Self {
        match value {
            "production" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Serde/schema-friendly mirror of [`cc_core::RateLimitRules`], used for
/// TOML configuration before being converted to the runtime type.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RateLimitRulesConfig {
    /// Maximum number of concurrent in-flight requests at `scope`.
    pub concurrency_limit: u32,
    /// Scope the bucket and semaphore are keyed by.
    pub scope: RateLimitScopeConfig,
    /// Token-bucket refill window, in milliseconds.
    pub window_ms: u64,
    /// Tokens granted per `window_ms`.
    pub tokens_per_window: u32,
    /// Vendor-specific header name overrides.
    #[serde(default)]
    pub header_overrides: RateLimitHeaderOverridesConfig,
}

impl RateLimitRulesConfig {
    /// Convert into the runtime [`cc_core::RateLimitRules`] type.
    pub fn to_rate_limit_rules(&self) -> RateLimitRules {
        RateLimitRules {
            concurrency_limit: self.concurrency_limit,
            scope: self.scope.into(),
            window_ms: self.window_ms,
            tokens_per_window: self.tokens_per_window,
            header_overrides: self.header_overrides.clone().into(),
        }
    }
}

/// TOML-friendly mirror of [`cc_core::RateLimitScope`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScopeConfig {
    /// Shared across every connection for a given connector.
    Connector,
    /// Scoped to a single connection (one credential bag).
    Connection,
    /// Shared across every connection in an organization.
    Organization,
}

impl From<RateLimitScopeConfig> for RateLimitScope {
    fn from(value: RateLimitScopeConfig) -> Self {
        match value {
            RateLimitScopeConfig::Connector => RateLimitScope::Connector,
            RateLimitScopeConfig::Connection => RateLimitScope::Connection,
            RateLimitScopeConfig::Organization => RateLimitScope::Organization,
        }
    }
}

/// TOML-friendly mirror of [`cc_core::RateLimitHeaderOverrides`].
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RateLimitHeaderOverridesConfig {
    /// Header name carrying the window's total budget.
    pub limit: Option<String>,
    /// Header name carrying the remaining budget.
    pub remaining: Option<String>,
    /// Header name carrying the window reset time.
    pub reset: Option<String>,
    /// Header name carrying a retry delay.
    pub retry_after: Option<String>,
}

impl From<RateLimitHeaderOverridesConfig> for RateLimitHeaderOverrides {
    fn from(value: RateLimitHeaderOverridesConfig) -> Self {
        RateLimitHeaderOverrides {
            limit: value.limit,
            remaining: value.remaining,
            reset: value.reset,
            retry_after: value.retry_after,
        }
    }
}

/// Default allowlist applied to connectors that don't carry their own
/// per-organization `networkAllowlist` credential field.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct NetworkAllowlistDefaults {
    /// Domain suffixes permitted by default.
    #[serde(default)]
    pub domains: Vec<String>,
    /// CIDR ranges permitted by default.
    #[serde(default)]
    pub ip_ranges: Vec<String>,
}

/// Top-level runtime configuration (spec §6.6).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Deployment environment (`NODE_ENV`).
    #[serde(default)]
    pub environment: Environment,

    /// Base URL this service considers itself reachable at, used as the
    /// OAuth callback origin (`BASE_URL`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Publicly advertised origin, when different from `base_url`
    /// (`SERVER_PUBLIC_URL`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_public_url: Option<String>,

    /// Whether the inline worker (in-process job execution rather than a
    /// separate worker process) is enabled (`ENABLE_INLINE_WORKER`).
    #[serde(default)]
    pub enable_inline_worker: bool,

    /// Skew, in milliseconds, subtracted from a token's `expiresAt` before
    /// considering it due for refresh (spec §4.3).
    #[serde(default = "default_refresh_skew_ms")]
    pub refresh_skew_ms: u64,

    /// Default network allowlist applied when a connection has none.
    #[serde(default)]
    pub network_allowlist_defaults: NetworkAllowlistDefaults,

    /// Per-connector rate-limit rules, keyed by connector id (spec §3:
    /// "owned by a process-wide registry initialized at startup").
    #[serde(default)]
    pub rate_limits: BTreeMap<String, RateLimitRulesConfig>,

    /// Per-connector credential-schema overrides supplied at registration
    /// time (spec §6.6), kept as opaque JSON since each connector defines
    /// its own schema shape.
    #[serde(default)]
    pub credential_schema_overrides: BTreeMap<String, serde_json::Value>,
}

fn default_refresh_skew_ms() -> u64 {
    30_000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            server_public_url: None,
            enable_inline_worker: false,
            refresh_skew_ms: default_refresh_skew_ms(),
            network_allowlist_defaults: NetworkAllowlistDefaults::default(),
            rate_limits: BTreeMap::new(),
            credential_schema_overrides: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ServiceConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ServiceConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|_| ConfigError::FileNotFound { path: p.display().to_string() })?;
            parse_toml(&content)?
        }
        None => ServiceConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`ServiceConfig`].
pub fn parse_toml(content: &str) -> Result<ServiceConfig, ConfigError> {
    toml::from_str::<ServiceConfig>(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (spec §6.6).
///
/// Recognised variables:
/// - `NODE_ENV`
/// - `BASE_URL`
/// - `SERVER_PUBLIC_URL`
/// - `ENABLE_INLINE_WORKER` (`"true"`/`"1"` enables it)
pub fn apply_env_overrides(config: &mut ServiceConfig) {
    if let Ok(val) = std::env::var("NODE_ENV") {
        config.environment = Environment::from_node_env(&val);
    }
    if let Ok(val) = std::env::var("BASE_URL") {
        config.base_url = Some(val);
    }
    if let Ok(val) = std::env::var("SERVER_PUBLIC_URL") {
        config.server_public_url = Some(val);
    }
    if let Ok(val) = std::env::var("ENABLE_INLINE_WORKER") {
        config.enable_inline_worker = val == "true" || val == "1";
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (zero-valued rate-limit windows, malformed base URLs) are
/// returned as a [`ConfigError::ValidationError`]; soft issues come back
/// as warnings.
pub fn validate_config(config: &ServiceConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref url) = config.base_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(format!("base_url '{url}' must start with http:// or https://"));
    }

    for (connector_id, rules) in &config.rate_limits {
        if rules.window_ms == 0 {
            errors.push(format!("connector '{connector_id}': window_ms must be greater than zero"));
        }
        if rules.concurrency_limit == 0 {
            errors.push(format!("connector '{connector_id}': concurrency_limit must be greater than zero"));
        }
    }

    if config.base_url.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "base_url".into(),
            hint: "OAuth callback origin will need to be supplied per-request".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Emit a [`ConfigWarning::NoRateLimitRules`] for each connector id in
/// `known_connector_ids` that has no entry in `config.rate_limits` (spec
/// §4.2's permissive-governor fallback).
pub fn warn_missing_rate_limits(config: &ServiceConfig, known_connector_ids: &[&str]) -> Vec<ConfigWarning> {
    known_connector_ids
        .iter()
        .filter(|id| !config.rate_limits.contains_key(**id))
        .map(|id| ConfigWarning::NoRateLimitRules { connector_id: (*id).to_string() })
        .collect()
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over
/// `base`. Maps are combined; on key collisions the overlay entry wins.
pub fn merge_configs(base: ServiceConfig, overlay: ServiceConfig) -> ServiceConfig {
    let mut rate_limits = base.rate_limits;
    rate_limits.extend(overlay.rate_limits);

    let mut credential_schema_overrides = base.credential_schema_overrides;
    credential_schema_overrides.extend(overlay.credential_schema_overrides);

    let mut domains = base.network_allowlist_defaults.domains;
    domains.extend(overlay.network_allowlist_defaults.domains);
    let mut ip_ranges = base.network_allowlist_defaults.ip_ranges;
    ip_ranges.extend(overlay.network_allowlist_defaults.ip_ranges);

    ServiceConfig {
        environment: overlay.environment,
        base_url: overlay.base_url.or(base.base_url),
        server_public_url: overlay.server_public_url.or(base.server_public_url),
        enable_inline_worker: overlay.enable_inline_worker || base.enable_inline_worker,
        refresh_skew_ms: overlay.refresh_skew_ms,
        network_allowlist_defaults: NetworkAllowlistDefaults { domains, ip_ranges },
        rate_limits,
        credential_schema_overrides,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
