// SPDX-License-Identifier: MIT OR Apache-2.0
//! Axum router composition for the connector execution core's HTTP control
//! plane (spec §6.4).
//!
//! Only the routes backed by a built module are wired up here: health and
//! readiness, metrics, the connector catalog and metadata resolver, registry
//! capabilities, and dynamic-options schema lookups. OAuth
//! authorize/callback and the executions/workflows surface have no
//! corresponding module in this crate and are intentionally not exposed.

#![deny(unsafe_code)]

pub mod middleware;

use axum::{
    extract::{Path as AxPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use cc_config::ServiceConfig;
use cc_core::ConnectorEntry;
use cc_metadata::{MetadataRegistry, MetadataRequest};
use cc_options::{DynamicOptionsRequest, OptionContext};
use cc_registry::HandlerRegistry;
use cc_telemetry::MetricsCollector;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Connector catalog, keyed by connector id (spec §3 `ConnectorEntry`).
    pub connectors: Arc<BTreeMap<String, ConnectorEntry>>,
    /// Metadata resolvers (C8).
    pub metadata: Arc<MetadataRegistry>,
    /// Dynamic-options service (C9).
    pub options: Arc<cc_options::DynamicOptionsService>,
    /// Operation dispatch registry (C6).
    pub registry: Arc<HandlerRegistry>,
    /// Loaded service configuration (C14).
    pub config: Arc<ServiceConfig>,
    /// Per-call metrics collector, surfaced at `/api/metrics`.
    pub metrics: Arc<MetricsCollector>,
}

/// Uniform error body for route handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Build the Axum router for the control-plane surface (spec §6.4).
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(cmd_health))
        .route("/api/ready", get(cmd_ready))
        .route("/api/live", get(cmd_live))
        .route("/api/metrics", get(cmd_metrics))
        .route("/metadata/v1/connectors", get(cmd_list_connectors))
        .route("/metadata/resolve", axum::routing::post(cmd_resolve_metadata))
        .route("/api/registry/capabilities", get(cmd_capabilities))
        .route("/schemas/{app}/{operation}/options/{parameter}", get(cmd_dynamic_options))
        .layer(axum::middleware::from_fn(middleware::RequestLogger::layer))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn cmd_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "time": Utc::now().to_rfc3339() }))
}

async fn cmd_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ready", "connectors": state.connectors.len() }))
}

async fn cmd_live() -> impl IntoResponse {
    Json(json!({ "status": "live" }))
}

async fn cmd_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.summary())
}

async fn cmd_list_connectors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ids = state.metadata.connector_ids();
    Json(json!({ "connectors": ids }))
}

#[derive(Debug, Deserialize)]
struct ResolveMetadataBody {
    connector_id: String,
    #[serde(default)]
    credentials: BTreeMap<String, String>,
    #[serde(default)]
    params: serde_json::Value,
    #[serde(default)]
    options: serde_json::Value,
}

async fn cmd_resolve_metadata(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveMetadataBody>,
) -> impl IntoResponse {
    let mut credentials = cc_core::Credentials::new();
    for (k, v) in body.credentials {
        credentials.set(k, v);
    }
    let request = MetadataRequest { credentials, params: body.params, options: body.options };
    let result = state.metadata.resolve(&body.connector_id, &request).await;
    Json(result)
}

async fn cmd_capabilities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries: Vec<&ConnectorEntry> = state.connectors.values().collect();
    Json(entries)
}

#[derive(Debug, Deserialize)]
struct DynamicOptionsQuery {
    #[serde(default)]
    connection_id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    organization_id: String,
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    force_refresh: bool,
}

async fn cmd_dynamic_options(
    AxPath((app, _operation, parameter)): AxPath<(String, String, String)>,
    axum::extract::Query(q): axum::extract::Query<DynamicOptionsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .connectors
        .get(&app)
        .ok_or_else(|| ApiError::not_found(format!("unknown connector '{app}'")))?;

    let request = DynamicOptionsRequest {
        connection_id: q.connection_id,
        user_id: q.user_id,
        organization_id: q.organization_id,
        parameter_path: parameter,
        context: OptionContext { dependencies: BTreeMap::new(), search: q.search, cursor: q.cursor, limit: q.limit },
        cache_ttl_ms: None,
        force_refresh: q.force_refresh,
    };

    let result = state
        .options
        .get_dynamic_options(&app, entry, request)
        .await
        .map_err(|e| ApiError::new(StatusCode::from_u16(e.status_code.unwrap_or(500)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), e.message))?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cc_core::{AuthenticationScheme, ConnectorAvailability, ConnectorLifecycle, PricingTier};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn sample_state() -> Arc<AppState> {
        let mut connectors = BTreeMap::new();
        connectors.insert(
            "google-sheets".to_string(),
            ConnectorEntry {
                id: "google-sheets".into(),
                display_name: "Google Sheets".into(),
                category: "productivity".into(),
                pricing_tier: PricingTier::Free,
                availability: ConnectorAvailability::Stable,
                lifecycle: ConnectorLifecycle::Active,
                scopes: vec![],
                authentication: AuthenticationScheme::BearerOAuth,
                actions: vec![],
                triggers: vec![],
                dynamic_option_configs: vec![],
                rate_limit_rules: None,
            },
        );
        Arc::new(AppState {
            connectors: Arc::new(connectors),
            metadata: Arc::new(MetadataRegistry::with_builtin_resolvers(reqwest::Client::new())),
            options: Arc::new(cc_options::DynamicOptionsService::new()),
            registry: Arc::new(HandlerRegistry::new()),
            config: Arc::new(ServiceConfig::default()),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_app(sample_state());
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_connectors_includes_builtins() {
        let app = build_app(sample_state());
        let response = app
            .oneshot(Request::builder().uri("/metadata/v1/connectors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["connectors"].as_array().unwrap().iter().any(|v| v == "hubspot"));
    }

    #[tokio::test]
    async fn capabilities_lists_registered_connectors() {
        let app = build_app(sample_state());
        let response = app
            .oneshot(Request::builder().uri("/api/registry/capabilities").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dynamic_options_unknown_connector_is_404() {
        let app = build_app(sample_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/schemas/not-a-connector/createRow/options/spreadsheetId")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_route_returns_empty_summary_initially() {
        let app = build_app(sample_state());
        let response = app
            .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["count"], 0);
    }
}
