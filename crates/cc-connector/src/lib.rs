//! Adapter capability trait (spec §6.2, "Polymorphism" in §9 Design Notes).
//!
//! Each vendor adapter is modeled as a value implementing [`ConnectorAdapter`]
//! rather than a class hierarchy: a `baseUrl`, an `authHeaders()` producer,
//! and (via `cc-registry`) a case-insensitive `operationId → handler` map.
//! This crate owns only the capability set and the shared auth-header
//! derivation; the operation map lives in `cc-registry`, and the HTTP
//! transport lives in `cc-pipeline`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cc_core::{AuthenticationScheme, Credentials};
use cc_error::ConnectorError;
use std::collections::BTreeMap;

/// A vendor adapter: identity, base URL, authentication scheme, and (via
/// `cc-registry`) its operation handlers.
///
/// Implementors typically only need [`ConnectorAdapter::id`],
/// [`ConnectorAdapter::base_url`], and [`ConnectorAdapter::authentication`] —
/// [`ConnectorAdapter::auth_headers`] and
/// [`ConnectorAdapter::query_auth_params`] have defaults derived from the
/// declared scheme (spec §6.2's table), and are overridden only by adapters
/// with a genuinely bespoke header shape.
pub trait ConnectorAdapter: Send + Sync {
    /// Stable connector id, e.g. `"asana"`.
    fn id(&self) -> &str;
    /// Base URL operations are resolved against.
    fn base_url(&self) -> &str;
    /// Declared authentication scheme (spec §3 `ConnectorEntry.authentication`).
    fn authentication(&self) -> &AuthenticationScheme;

    /// Build the headers to attach to every outbound request for this
    /// adapter, given the connection's current credentials.
    fn auth_headers(&self, credentials: &Credentials) -> Result<BTreeMap<String, String>, ConnectorError> {
        default_auth_headers(self.authentication(), credentials)
    }

    /// Build the query-string parameters to append for schemes that carry
    /// the token in the URL rather than a header (spec §6.2 "Query-string
    /// token").
    fn query_auth_params(&self, credentials: &Credentials) -> Vec<(String, String)> {
        default_query_auth_params(self.authentication(), credentials)
    }
}

/// Derive request headers from a declared [`AuthenticationScheme`] (spec
/// §6.2 table). Adapters with a non-conforming header shape should override
/// [`ConnectorAdapter::auth_headers`] instead of fighting this default.
pub fn default_auth_headers(
    scheme: &AuthenticationScheme,
    credentials: &Credentials,
) -> Result<BTreeMap<String, String>, ConnectorError> {
    let mut headers = BTreeMap::new();

    match scheme {
        AuthenticationScheme::BearerOAuth => {
            let token = credentials
                .access_token()
                .ok_or_else(|| ConnectorError::auth("missing accessToken for bearer-OAuth connector"))?;
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        AuthenticationScheme::ApiKeyHeader { header_name } => {
            let key = credentials
                .api_key()
                .ok_or_else(|| ConnectorError::auth("missing apiKey for API-key-header connector"))?;
            headers.insert(header_name.clone(), key.to_string());
        }
        AuthenticationScheme::HttpBasic => {
            let user = basic_username(credentials)
                .ok_or_else(|| ConnectorError::auth("missing credentials for HTTP Basic connector"))?;
            let password = basic_password(credentials);
            let encoded = BASE64.encode(format!("{user}:{password}"));
            headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
        }
        AuthenticationScheme::QueryToken { .. } => {
            // Carried in the query string; no header to attach.
        }
    }

    Ok(headers)
}

/// Derive query-string auth parameters from a declared scheme, for the
/// query-token case only (spec §6.2: Pipedrive's `?api_token=…`).
pub fn default_query_auth_params(scheme: &AuthenticationScheme, credentials: &Credentials) -> Vec<(String, String)> {
    match scheme {
        AuthenticationScheme::QueryToken { param_name } => credentials
            .api_key()
            .map(|token| vec![(param_name.clone(), token.to_string())])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// HTTP Basic's username half. Falls back to `apiKey` so API-key-as-basic
/// shapes (Freshdesk's `apiKey:X`, Greenhouse's `apiKey:`) need no adapter
/// code of their own.
fn basic_username(credentials: &Credentials) -> Option<String> {
    credentials
        .get_str("basicUser")
        .or_else(|| credentials.api_key())
        .map(str::to_string)
}

/// HTTP Basic's password half, defaulting to empty (Greenhouse's `apiKey:`).
fn basic_password(credentials: &Credentials) -> String {
    credentials.get_str("basicPassword").unwrap_or("").to_string()
}
