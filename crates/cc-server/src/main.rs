// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use cc_core::{AuthenticationScheme, ConnectorAvailability, ConnectorEntry, ConnectorLifecycle, PricingTier};
use cc_server::{build_app, AppState};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cc-server", version, about = "Connector execution core HTTP control plane")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8089")]
    bind: String,

    /// Path to a TOML config file. Defaults to built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { EnvFilter::new("cc=debug") } else { EnvFilter::new("cc=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = cc_config::load_config(args.config.as_deref()).context("load config")?;
    cc_config::apply_env_overrides(&mut config);
    let warnings = cc_config::validate_config(&config).context("validate config")?;
    for warning in &warnings {
        tracing::warn!(%warning, "config warning");
    }

    let state = Arc::new(AppState {
        connectors: Arc::new(builtin_connector_catalog()),
        metadata: Arc::new(cc_metadata::MetadataRegistry::with_builtin_resolvers(reqwest::Client::new())),
        options: Arc::new(cc_options::DynamicOptionsService::new()),
        registry: Arc::new(cc_registry::HandlerRegistry::new()),
        config: Arc::new(config),
        metrics: Arc::new(cc_telemetry::MetricsCollector::new()),
    });

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await.with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "cc-server listening");

    axum::serve(listener, app).await.context("serve")
}

/// The connector entries known out of the box (one per built-in metadata
/// resolver, spec §4.7's Airtable/Gmail/Google Sheets/HubSpot/Salesforce
/// set), used to back `/api/registry/capabilities` and the dynamic-options
/// schema route until a persisted catalog store is wired in.
fn builtin_connector_catalog() -> BTreeMap<String, ConnectorEntry> {
    let plain = |id: &str, display_name: &str, category: &str| ConnectorEntry {
        id: id.to_string(),
        display_name: display_name.to_string(),
        category: category.to_string(),
        pricing_tier: PricingTier::Free,
        availability: ConnectorAvailability::Stable,
        lifecycle: ConnectorLifecycle::Active,
        scopes: vec![],
        authentication: AuthenticationScheme::BearerOAuth,
        actions: vec![],
        triggers: vec![],
        dynamic_option_configs: vec![],
        rate_limit_rules: None,
    };

    [
        plain("airtable", "Airtable", "productivity"),
        plain("gmail", "Gmail", "communication"),
        plain("google-sheets", "Google Sheets", "productivity"),
        plain("hubspot", "HubSpot", "crm"),
        plain("salesforce", "Salesforce", "crm"),
    ]
    .into_iter()
    .map(|entry| (entry.id.clone(), entry))
    .collect()
}
