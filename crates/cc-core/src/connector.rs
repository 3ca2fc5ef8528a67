//! Connector registry records (spec §3 `ConnectorEntry`, `RateLimitRules`).

use serde::{Deserialize, Serialize};

/// The scope under which rate-limit state accumulates (spec glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// Shared across every connection for a given connector.
    Connector,
    /// Scoped to a single connection (one credential bag).
    Connection,
    /// Shared across every connection in an organization.
    Organization,
}

/// Per-connector vendor-header overrides used by the rate governor when
/// parsing `X-RateLimit-*`-style headers (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitHeaderOverrides {
    /// Header name carrying the window's total budget.
    pub limit: Option<String>,
    /// Header name carrying the remaining budget.
    pub remaining: Option<String>,
    /// Header name carrying the window reset time.
    pub reset: Option<String>,
    /// Header name carrying a retry delay.
    pub retry_after: Option<String>,
}

/// Rate-limit configuration for a connector (spec §3 `RateLimitRules`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRules {
    /// Maximum number of concurrent in-flight requests at `scope`.
    pub concurrency_limit: u32,
    /// Scope the bucket and semaphore are keyed by.
    pub scope: RateLimitScope,
    /// Token-bucket refill window, in milliseconds.
    pub window_ms: u64,
    /// Tokens granted per `window_ms`.
    pub tokens_per_window: u32,
    /// Vendor-specific header name overrides.
    #[serde(default)]
    pub header_overrides: RateLimitHeaderOverrides,
}

impl RateLimitRules {
    /// A permissive default: no concurrency cap beyond a generous ceiling,
    /// no bucket throttling. Used when a connector has no configured rules
    /// (spec §4.2: "If no rules are configured, the governor is permissive").
    pub fn permissive() -> Self {
        Self {
            concurrency_limit: u32::MAX,
            scope: RateLimitScope::Connector,
            window_ms: 1,
            tokens_per_window: u32::MAX,
            header_overrides: RateLimitHeaderOverrides::default(),
        }
    }
}

/// Authentication schemes observed across adapters (spec §6.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AuthenticationScheme {
    /// `Authorization: Bearer <accessToken>`.
    BearerOAuth,
    /// A vendor-specific API key header, e.g. `X-Auth-Token`.
    ApiKeyHeader {
        /// Header name carrying the key.
        header_name: String,
    },
    /// `Authorization: Basic base64(user:pass)`.
    HttpBasic,
    /// A query-string token appended by the adapter.
    QueryToken {
        /// Query parameter name.
        param_name: String,
    },
}

/// Marketing/catalog metadata describing how prominently a connector is
/// surfaced (spec §3 `ConnectorEntry.pricingTier`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    /// Included in every plan.
    Free,
    /// Requires a paid plan.
    Standard,
    /// Enterprise-only.
    Premium,
}

/// Rollout status of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorAvailability {
    /// Not yet released.
    Private,
    /// Behind a feature flag / opt-in.
    Beta,
    /// Generally available.
    Stable,
    /// No longer receiving updates.
    Deprecated,
}

/// Maintenance lifecycle classification, orthogonal to [`ConnectorAvailability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorLifecycle {
    /// Actively developed.
    Active,
    /// Maintenance mode: bug fixes only.
    Maintained,
    /// Scheduled for removal.
    Sunset,
}

/// Declarative dynamic-option binding (spec §3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicOptionConfig {
    /// Identifier of the handler that resolves this field's options.
    pub handler_id: String,
    /// Dot-path of the form parameter this config populates.
    pub parameter_path: String,
    /// Other parameter names whose values must be present in
    /// `context.dependencies` before resolution is attempted.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Field name in the raw result to use as the option label.
    pub label_field: Option<String>,
    /// Field name in the raw result to use as the option value.
    pub value_field: Option<String>,
    /// Query parameter name the vendor uses for free-text search.
    pub search_param: Option<String>,
    /// How long a resolved result is cached, in milliseconds.
    pub cache_ttl_ms: u64,
}

/// Registry record for one connector (spec §3 `ConnectorEntry`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectorEntry {
    /// Stable identifier, e.g. `"asana"`.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Catalog category, e.g. `"productivity"`.
    pub category: String,
    /// Plan tier required to use this connector.
    pub pricing_tier: PricingTier,
    /// Rollout status.
    pub availability: ConnectorAvailability,
    /// Maintenance status.
    pub lifecycle: ConnectorLifecycle,
    /// OAuth scopes requested during authorization, if applicable.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Authentication scheme this connector expects.
    pub authentication: AuthenticationScheme,
    /// Operation ids exposed as actions.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Operation ids exposed as triggers.
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Dynamic-option bindings for form fields.
    #[serde(default)]
    pub dynamic_option_configs: Vec<DynamicOptionConfig>,
    /// Rate-limit configuration; `None` means permissive (spec §4.2).
    #[serde(default)]
    pub rate_limit_rules: Option<RateLimitRules>,
}

impl ConnectorEntry {
    /// Find the dynamic-option config bound to `parameter_path`.
    pub fn dynamic_option_config(&self, parameter_path: &str) -> Option<&DynamicOptionConfig> {
        self.dynamic_option_configs
            .iter()
            .find(|c| c.parameter_path == parameter_path)
    }

    /// Effective rate-limit rules, falling back to [`RateLimitRules::permissive`].
    pub fn effective_rate_limit_rules(&self) -> RateLimitRules {
        self.rate_limit_rules.clone().unwrap_or_else(RateLimitRules::permissive)
    }
}
