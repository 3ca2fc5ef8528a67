// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the connector CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use anyhow::{Context, Result};
use cc_metadata::{MetadataRegistry, MetadataRequest};
use cc_options::DynamicOptionsService;
use cc_registry::HandlerRegistry;
use std::path::Path;

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`cc_config::ServiceConfig`].
    Config,
}

/// Return the JSON schema string for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Config => serde_json::to_value(schemars::schema_for!(cc_config::ServiceConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// Load and validate a configuration file, returning human-readable
/// diagnostics (errors and warnings).
pub fn config_check(path: Option<&Path>) -> Result<Vec<String>> {
    let mut diagnostics = Vec::new();

    let config = match cc_config::load_config(path) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.push(format!("error: {e}"));
            return Ok(diagnostics);
        }
    };

    match cc_config::validate_config(&config) {
        Ok(warnings) => {
            diagnostics.push("config: ok".into());
            for w in &warnings {
                diagnostics.push(format!("warning: {w}"));
            }
        }
        Err(cc_config::ConfigError::ValidationError { reasons }) => {
            for r in &reasons {
                diagnostics.push(format!("error: {r}"));
            }
        }
        Err(e) => diagnostics.push(format!("error: {e}")),
    }

    Ok(diagnostics)
}

/// Dispatch a bare operation against an empty registry (no connector
/// adapters are wired into the CLI itself; this is a smoke-testing tool
/// for handlers registered by adapter code under local development, spec
/// §4.11's "execute").
pub async fn execute(registry: &HandlerRegistry, operation_id: &str, params: serde_json::Value) -> Result<String> {
    let resp = registry.execute(operation_id, params).await;
    serde_json::to_string_pretty(&resp).context("serialize response")
}

/// Resolve metadata for `connector_id` (spec §4.7), printing the result as
/// pretty JSON.
pub async fn resolve_metadata(
    registry: &MetadataRegistry,
    connector_id: &str,
    params: serde_json::Value,
) -> Result<String> {
    let req = MetadataRequest { credentials: cc_core::Credentials::new(), params, options: serde_json::json!({}) };
    let result = registry.resolve(connector_id, &req).await;
    serde_json::to_string_pretty(&result).context("serialize metadata result")
}

/// List the connector ids with a registered metadata resolver.
pub fn list_metadata_connectors(registry: &MetadataRegistry) -> Vec<String> {
    registry.connector_ids()
}

/// Build the metadata registry the CLI uses for `metadata resolve` and
/// `registry list`.
pub fn default_metadata_registry() -> MetadataRegistry {
    MetadataRegistry::with_builtin_resolvers(reqwest::Client::new())
}

/// Build the (initially empty) dynamic-options service the CLI exposes for
/// local smoke-testing.
pub fn default_options_service() -> DynamicOptionsService {
    DynamicOptionsService::new()
}
