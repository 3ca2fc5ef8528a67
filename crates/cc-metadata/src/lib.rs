//! Metadata resolver (spec §4.7, C8): per-connector discovery-endpoint
//! resolvers exposed behind a single [`MetadataRegistry::resolve`] entry
//! point, normalized through a connector-id alias table.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod airtable;
mod gmail;
mod google_sheets;
mod hubspot;
mod salesforce;
mod support;

use async_trait::async_trait;
use cc_core::Credentials;
use std::collections::HashMap;
use std::sync::Arc;

pub use airtable::AirtableResolver;
pub use gmail::GmailResolver;
pub use google_sheets::GoogleSheetsResolver;
pub use hubspot::HubspotResolver;
pub use salesforce::SalesforceResolver;

/// Columnar/shape description extracted from a vendor's discovery endpoint
/// (spec §4.7 step 4).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ResolvedMetadata {
    /// Column/field names, in discovery order.
    pub columns: Vec<String>,
    /// Header row, when the source is spreadsheet-shaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    /// One representative sample record, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<serde_json::Value>,
    /// Per-field type/label schema, vendor-shaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Provenance tags, e.g. `["api:google-sheets"]`.
    pub derived_from: Vec<String>,
}

/// Uniform result of a metadata resolution attempt (spec §4.7).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct MetadataResolutionResult {
    /// Whether resolution succeeded.
    pub success: bool,
    /// Resolved shape, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResolvedMetadata>,
    /// Resolver-specific extras (e.g. the matched tab/object name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
    /// Human-readable error, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status observed from the vendor, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl MetadataResolutionResult {
    pub(crate) fn ok(metadata: ResolvedMetadata, extras: Option<serde_json::Value>) -> Self {
        Self { success: true, metadata: Some(metadata), extras, error: None, status: None }
    }

    pub(crate) fn failure(error: impl Into<String>, status: u16) -> Self {
        Self { success: false, metadata: None, extras: None, error: Some(error.into()), status: Some(status) }
    }
}

/// Inputs to a metadata resolution call (spec §4.7 `resolve`).
pub struct MetadataRequest {
    /// Connection credentials (the resolver pulls `accessToken` or a vendor
    /// equivalent from this).
    pub credentials: Credentials,
    /// Caller-supplied parameters (e.g. `spreadsheetId`, `sheetName`).
    pub params: serde_json::Value,
    /// Resolver-specific options.
    pub options: serde_json::Value,
}

impl MetadataRequest {
    /// Read a string parameter from `params`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// A per-connector discovery resolver (spec §4.7).
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolve metadata for one connection, given its credentials and call
    /// parameters.
    async fn resolve(&self, http: &reqwest::Client, req: &MetadataRequest) -> MetadataResolutionResult;
}

/// Dispatches `resolve(connectorId, …)` to a per-connector resolver after
/// normalizing `connectorId` through an alias table (spec §4.7: `sheets →
/// google-sheets`, `gmail-enhanced → gmail`).
pub struct MetadataRegistry {
    resolvers: HashMap<String, Arc<dyn MetadataResolver>>,
    aliases: HashMap<String, String>,
    http: reqwest::Client,
}

impl MetadataRegistry {
    /// Build a registry with the five built-in connector resolvers and their
    /// documented aliases.
    pub fn with_builtin_resolvers(http: reqwest::Client) -> Self {
        let mut registry = Self { resolvers: HashMap::new(), aliases: HashMap::new(), http };
        registry.register("google-sheets", Arc::new(GoogleSheetsResolver::default()));
        registry.register("gmail", Arc::new(GmailResolver));
        registry.register("salesforce", Arc::new(SalesforceResolver));
        registry.register("hubspot", Arc::new(HubspotResolver));
        registry.register("airtable", Arc::new(AirtableResolver));
        registry.alias("sheets", "google-sheets");
        registry.alias("gmail-enhanced", "gmail");
        registry
    }

    /// Register a resolver under a canonical connector id.
    pub fn register(&mut self, connector_id: impl Into<String>, resolver: Arc<dyn MetadataResolver>) {
        self.resolvers.insert(connector_id.into(), resolver);
    }

    /// Register an alias pointing at a canonical connector id.
    pub fn alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    fn normalize(&self, connector_id: &str) -> String {
        self.aliases.get(connector_id).cloned().unwrap_or_else(|| connector_id.to_string())
    }

    /// Canonical connector ids with a registered resolver, sorted for
    /// stable display (e.g. by `cc registry list`).
    pub fn connector_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.resolvers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve metadata for `connector_id` (spec §4.7 `resolve`).
    pub async fn resolve(&self, connector_id: &str, req: &MetadataRequest) -> MetadataResolutionResult {
        let canonical = self.normalize(connector_id);
        let Some(resolver) = self.resolvers.get(&canonical) else {
            return MetadataResolutionResult::failure(format!("no metadata resolver for '{connector_id}'"), 404);
        };
        resolver.resolve(&self.http, req).await
    }
}
