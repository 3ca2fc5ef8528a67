// SPDX-License-Identifier: MIT OR Apache-2.0
use axum::body::Body;
use axum::http::{Request, StatusCode};
use cc_core::{AuthenticationScheme, ConnectorAvailability, ConnectorEntry, ConnectorLifecycle, DynamicOptionConfig, PricingTier};
use cc_metadata::MetadataRegistry;
use cc_options::DynamicOptionsService;
use cc_registry::HandlerRegistry;
use cc_server::{build_app, AppState};
use cc_telemetry::MetricsCollector;
use http_body_util::BodyExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

fn google_sheets_entry() -> ConnectorEntry {
    ConnectorEntry {
        id: "google-sheets".into(),
        display_name: "Google Sheets".into(),
        category: "productivity".into(),
        pricing_tier: PricingTier::Free,
        availability: ConnectorAvailability::Stable,
        lifecycle: ConnectorLifecycle::Active,
        scopes: vec![],
        authentication: AuthenticationScheme::BearerOAuth,
        actions: vec!["appendRow".into()],
        triggers: vec![],
        dynamic_option_configs: vec![DynamicOptionConfig {
            handler_id: "listSpreadsheets".into(),
            parameter_path: "spreadsheetId".into(),
            depends_on: vec![],
            label_field: Some("name".into()),
            value_field: Some("id".into()),
            search_param: None,
            cache_ttl_ms: 60_000,
        }],
        rate_limit_rules: None,
    }
}

fn test_state() -> Arc<AppState> {
    let mut connectors = BTreeMap::new();
    let entry = google_sheets_entry();
    connectors.insert(entry.id.clone(), entry);

    Arc::new(AppState {
        connectors: Arc::new(connectors),
        metadata: Arc::new(MetadataRegistry::with_builtin_resolvers(reqwest::Client::new())),
        options: Arc::new(DynamicOptionsService::new()),
        registry: Arc::new(HandlerRegistry::new()),
        config: Arc::new(cc_config::ServiceConfig::default()),
        metrics: Arc::new(MetricsCollector::new()),
    })
}

#[tokio::test]
async fn health_and_ready_and_live_all_ok() {
    let app = build_app(test_state());

    for path in ["/api/health", "/api/ready", "/api/live"] {
        let resp = app.clone().oneshot(Request::builder().uri(path).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn response_carries_request_id_header() {
    let app = build_app(test_state());
    let resp = app.oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn resolve_metadata_unknown_connector_is_404_in_body() {
    let app = build_app(test_state());
    let body = serde_json::json!({ "connector_id": "not-a-connector" }).to_string();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/metadata/resolve")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn dynamic_options_route_requires_dependency() {
    let app = build_app(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/schemas/google-sheets/appendRow/options/spreadsheetId")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn capabilities_reports_connector_entry_fields() {
    let app = build_app(test_state());
    let resp = app.oneshot(Request::builder().uri("/api/registry/capabilities").body(Body::empty()).unwrap()).await.unwrap();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "google-sheets");
}
