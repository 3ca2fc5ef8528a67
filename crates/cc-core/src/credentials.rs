//! The credential bag (spec §3 `Credentials`).

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved system field carried on every call: organization id.
pub const FIELD_ORGANIZATION_ID: &str = "__organizationId";
/// Reserved system field carried on every call: connection id.
pub const FIELD_CONNECTION_ID: &str = "__connectionId";
/// Reserved system field carried on every call: user id.
pub const FIELD_USER_ID: &str = "__userId";
/// Reserved system field carried on every call: the org's network allowlist.
pub const FIELD_NETWORK_ALLOWLIST: &str = "__organizationNetworkAllowlist";

/// A string-keyed bag of credential material.
///
/// The caller's connection store owns the canonical record; the pipeline
/// holds a mutable working copy for the lifetime of one execution and
/// reports changes back through a refresh callback (see `cc-oauth`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

impl Credentials {
    /// Construct an empty credential bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct from an existing field map.
    pub fn from_fields(fields: BTreeMap<String, serde_json::Value>) -> Self {
        Self { fields }
    }

    /// Get a raw field by name.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Get a string-typed field by name.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Set a field, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
    }

    /// Merge a partial update into this bag (spec §4.11
    /// `updateCredentials`), overwriting only the keys present in `partial`.
    pub fn merge(&mut self, partial: &Credentials) {
        for (k, v) in &partial.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// `apiKey` field.
    pub fn api_key(&self) -> Option<&str> {
        self.get_str("apiKey")
    }
    /// `accessToken` field.
    pub fn access_token(&self) -> Option<&str> {
        self.get_str("accessToken")
    }
    /// `refreshToken` field.
    pub fn refresh_token(&self) -> Option<&str> {
        self.get_str("refreshToken")
    }
    /// `clientId` field.
    pub fn client_id(&self) -> Option<&str> {
        self.get_str("clientId")
    }
    /// `clientSecret` field.
    pub fn client_secret(&self) -> Option<&str> {
        self.get_str("clientSecret")
    }
    /// `tokenUrl` field.
    pub fn token_url(&self) -> Option<&str> {
        self.get_str("tokenUrl")
    }

    /// `expiresAt`, normalized to epoch milliseconds. Accepts either a
    /// numeric epoch-ms value or an ISO-8601 string.
    pub fn expires_at_ms(&self) -> Option<i64> {
        match self.fields.get("expiresAt")? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => {
                DateTime::parse_from_rfc3339(s).ok().map(|d| d.timestamp_millis())
            }
            _ => None,
        }
    }

    /// Set `accessToken`.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.set("accessToken", token.into());
    }
    /// Set `refreshToken`.
    pub fn set_refresh_token(&mut self, token: impl Into<String>) {
        self.set("refreshToken", token.into());
    }
    /// Set `expiresAt` as epoch milliseconds.
    pub fn set_expires_at_ms(&mut self, epoch_ms: i64) {
        self.set("expiresAt", epoch_ms);
    }

    /// Reserved `__organizationId` field.
    pub fn organization_id(&self) -> Option<&str> {
        self.get_str(FIELD_ORGANIZATION_ID)
    }
    /// Reserved `__connectionId` field.
    pub fn connection_id(&self) -> Option<&str> {
        self.get_str(FIELD_CONNECTION_ID)
    }
    /// Reserved `__userId` field.
    pub fn user_id(&self) -> Option<&str> {
        self.get_str(FIELD_USER_ID)
    }

    /// Whether all four fields needed to attempt an OAuth refresh are
    /// present: `refreshToken`, `clientId`, `clientSecret`, `tokenUrl`.
    pub fn has_refresh_material(&self) -> bool {
        self.refresh_token().is_some()
            && self.client_id().is_some()
            && self.client_secret().is_some()
            && self.token_url().is_some()
    }

    /// Reserved `__organizationNetworkAllowlist` field, parsed.
    pub fn network_allowlist(&self) -> NetworkAllowlist {
        self.fields
            .get(FIELD_NETWORK_ALLOWLIST)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Iterate all fields (for diagnostics; do not log credential values).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }
}

/// Per-organization egress allowlist (spec §4.9), traveling as a reserved
/// credential field so the pipeline can enforce it without a side lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkAllowlist {
    /// Domain suffix rules (e.g. `"*.example.com"`, `"api.vendor.net"`).
    #[serde(default)]
    pub domains: Vec<String>,
    /// CIDR or bare-IP rules (IPv4 and IPv6).
    #[serde(default, rename = "ipRanges")]
    pub ip_ranges: Vec<String>,
}

impl NetworkAllowlist {
    /// An allowlist with no rules, which admits every host (spec §4.9.1).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.ip_ranges.is_empty()
    }
}
