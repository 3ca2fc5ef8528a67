// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenario tests (spec §8), each driving the pipeline's real
//! collaborators (governor, token manager, allowlist, retry engine) against
//! a `wiremock` server rather than exercising one crate in isolation.

use cc_core::{
    AuthenticationScheme, ConnectorAvailability, ConnectorEntry, ConnectorLifecycle, Credentials, DynamicOption,
    DynamicOptionConfig, DynamicOptionResult, NetworkAllowlist, PricingTier, RateLimitRules, RateLimitScope,
    FIELD_NETWORK_ALLOWLIST,
};
use cc_connector::ConnectorAdapter;
use cc_metadata::{GoogleSheetsResolver, MetadataRequest, MetadataResolver};
use cc_oauth::{OnTokenRefreshed, RefreshOutcome, TokenRefreshManager, DEFAULT_REFRESH_SKEW_MS};
use cc_options::{DynamicOptionsRequest, DynamicOptionsService, OptionContext};
use cc_pipeline::{CallScope, MiddlewareChain, Pipeline, RateLimitFeedbackMiddleware, RequestCall};
use cc_policy::{admit, AuditEvent, AuditSink, CallIdentifiers, NoopAuditSink};
use cc_ratelimit::RateLimitGovernor;
use cc_retry::{with_retries, RetryPolicy};
use futures::FutureExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestAdapter {
    id: String,
    base_url: String,
}

impl ConnectorAdapter for TestAdapter {
    fn id(&self) -> &str {
        &self.id
    }
    fn base_url(&self) -> &str {
        &self.base_url
    }
    fn authentication(&self) -> &AuthenticationScheme {
        &AuthenticationScheme::BearerOAuth
    }
}

fn entry_with_rate_limits(rate_limit_rules: Option<RateLimitRules>) -> ConnectorEntry {
    ConnectorEntry {
        id: "acme".into(),
        display_name: "Acme".into(),
        category: "productivity".into(),
        pricing_tier: PricingTier::Free,
        availability: ConnectorAvailability::Stable,
        lifecycle: ConnectorLifecycle::Active,
        scopes: vec![],
        authentication: AuthenticationScheme::BearerOAuth,
        actions: vec![],
        triggers: vec![],
        dynamic_option_configs: vec![],
        rate_limit_rules,
    }
}

fn bearer_credentials() -> Credentials {
    let mut creds = Credentials::new();
    creds.set_access_token("tok");
    creds
}

/// S1 — rate-limit penalty & recovery. Governor configured with
/// `concurrency_limit: 2` at connector scope; three concurrent calls race
/// for two permits, the odd one out hits a vendor 429 with `Retry-After:
/// 1`, and a follow-up call must wait out that penalty before admission.
#[tokio::test]
async fn s1_rate_limit_penalty_and_recovery() {
    let server = MockServer::start().await;
    let call_count = Arc::new(AtomicU32::new(0));

    {
        let call_count = call_count.clone();
        Mock::given(method("GET"))
            .and(path("/v1/items"))
            .respond_with(move |_req: &wiremock::Request| {
                let n = call_count.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    ResponseTemplate::new(200)
                        .insert_header("x-ratelimit-remaining", "8")
                        .set_body_json(serde_json::json!({"ok": true}))
                } else {
                    ResponseTemplate::new(429).insert_header("retry-after", "1")
                }
            })
            .mount(&server)
            .await;
    }

    let governor = Arc::new(RateLimitGovernor::new());
    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        governor.clone(),
        Arc::new(TokenRefreshManager::default()),
        MiddlewareChain::new().with(RateLimitFeedbackMiddleware::new(governor.clone())),
        "cc-test/1.0",
    );

    let rules = RateLimitRules {
        concurrency_limit: 2,
        scope: RateLimitScope::Connector,
        window_ms: 1000,
        tokens_per_window: 10,
        header_overrides: Default::default(),
    };
    let entry = entry_with_rate_limits(Some(rules));
    let adapter = TestAdapter { id: "acme".into(), base_url: server.uri() };

    let mut creds_a = bearer_credentials();
    let mut creds_b = bearer_credentials();
    let mut creds_c = bearer_credentials();
    let scope = CallScope { connection_id: "conn_1", organization_id: "org_1", user_id: None };

    let started = Instant::now();
    let (resp_a, resp_b, resp_c) = tokio::join!(
        pipeline.make_request(
            &adapter,
            &entry,
            &mut creds_a,
            &scope,
            RequestCall::new(reqwest::Method::GET, "/v1/items"),
            &NoopAuditSink,
        ),
        pipeline.make_request(
            &adapter,
            &entry,
            &mut creds_b,
            &scope,
            RequestCall::new(reqwest::Method::GET, "/v1/items"),
            &NoopAuditSink,
        ),
        pipeline.make_request(
            &adapter,
            &entry,
            &mut creds_c,
            &scope,
            RequestCall::new(reqwest::Method::GET, "/v1/items"),
            &NoopAuditSink,
        ),
    );

    let responses = [&resp_a, &resp_b, &resp_c];
    assert_eq!(responses.iter().filter(|r| r.success).count(), 2);
    assert!(responses.iter().any(|r| r.status_code == Some(429)));

    // A follow-up call shortly after must wait out the scheduled penalty
    // (≈1s, per `Retry-After: 1`) before it is admitted.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut creds_d = bearer_credentials();
    pipeline
        .make_request(
            &adapter,
            &entry,
            &mut creds_d,
            &scope,
            RequestCall::new(reqwest::Method::GET, "/v1/items"),
            &NoopAuditSink,
        )
        .await;
    assert!(started.elapsed() >= Duration::from_millis(750));
}

/// S2 — single-flight refresh. Five concurrent callers sharing
/// near-expired credentials trigger exactly one POST to the token
/// endpoint; all five proceed with the refreshed token, and the
/// refresh callback fires exactly once.
#[tokio::test]
async fn s2_single_flight_refresh() {
    let server = MockServer::start().await;
    let refresh_calls = Arc::new(AtomicU32::new(0));
    {
        let refresh_calls = refresh_calls.clone();
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(move |_req: &wiremock::Request| {
                refresh_calls.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": "B", "expires_in": 3600 }))
            })
            .mount(&server)
            .await;
    }

    struct CountingCallback(Arc<Mutex<u32>>);
    #[async_trait::async_trait]
    impl OnTokenRefreshed for CountingCallback {
        async fn call(&self, outcome: &RefreshOutcome) {
            assert_eq!(outcome.access_token, "B");
            *self.0.lock().unwrap() += 1;
        }
    }

    let manager = Arc::new(TokenRefreshManager::new(reqwest::Client::new(), DEFAULT_REFRESH_SKEW_MS));
    let call_count = Arc::new(Mutex::new(0u32));
    let callback = Arc::new(CountingCallback(call_count.clone()));
    let token_url = format!("{}/token", server.uri());

    let make_creds = |token_url: &str| {
        let mut c = Credentials::new();
        c.set("accessToken", serde_json::json!("A"));
        c.set("expiresAt", serde_json::json!(chrono::Utc::now().timestamp_millis() - 1));
        c.set("refreshToken", serde_json::json!("R"));
        c.set("clientId", serde_json::json!("C"));
        c.set("clientSecret", serde_json::json!("S"));
        c.set("tokenUrl", serde_json::json!(token_url));
        c
    };

    let mut handles = Vec::new();
    for _ in 0..5 {
        let manager = manager.clone();
        let callback = callback.clone();
        let mut creds = make_creds(&token_url);
        handles.push(tokio::spawn(async move {
            manager.maybe_refresh(&mut creds, "conn_shared", callback.as_ref()).await.unwrap();
            creds
        }));
    }

    for handle in handles {
        let creds = handle.await.unwrap();
        assert_eq!(creds.access_token(), Some("B"));
    }

    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*call_count.lock().unwrap(), 1);
}

/// S3 — allowlist denial. A call to a host outside the configured
/// allowlist never reaches the network; the audit sink records exactly
/// one `host_not_allowlisted` event, and the pipeline never issues the
/// HTTP request.
#[tokio::test]
async fn s3_allowlist_denial() {
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }
    impl AuditSink for RecordingSink {
        fn record(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    let allowlist = NetworkAllowlist { domains: vec!["*.example.com".into()], ip_ranges: vec!["10.0.0.0/8".into()] };
    let sink = RecordingSink { events: Mutex::new(Vec::new()) };
    let ids = CallIdentifiers { organization_id: Some("org_1"), connection_id: Some("conn_1"), user_id: None };

    let result = admit("https://api.vendor.net/v1/me", &allowlist, &ids, &sink);

    assert!(result.is_err());
    assert!(result.unwrap_err().message.contains("not allowlisted"));

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attempted_host, "api.vendor.net");
    assert_eq!(events[0].reason, "host_not_allowlisted");
}

/// S3b — the same denial, driven through the full pipeline via the
/// reserved `__organizationNetworkAllowlist` credential field, confirming
/// no HTTP request is ever issued to the vendor.
#[tokio::test]
async fn s3_allowlist_denial_blocks_before_any_http_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/v1/me")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let allowlist = NetworkAllowlist { domains: vec!["*.example.com".into()], ip_ranges: vec![] };
    let governor = Arc::new(RateLimitGovernor::new());
    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        governor.clone(),
        Arc::new(TokenRefreshManager::default()),
        MiddlewareChain::new(),
        "cc-test/1.0",
    );

    let mut creds = bearer_credentials();
    creds.set(FIELD_NETWORK_ALLOWLIST, allowlist);
    let entry = entry_with_rate_limits(None);
    let adapter = TestAdapter { id: "vendor".into(), base_url: "https://api.vendor.net".into() };
    let scope = CallScope { connection_id: "conn_1", organization_id: "org_1", user_id: None };

    let resp = pipeline
        .make_request(&adapter, &entry, &mut creds, &scope, RequestCall::new(reqwest::Method::GET, "/v1/me"), &NoopAuditSink)
        .await;

    assert!(!resp.success);
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// S4 — Sheets metadata happy path: tab list, header row, and one sample
/// row are resolved from a spreadsheet id and a valid access token.
#[tokio::test]
async fn s4_sheets_metadata_happy_path() {
    let server = MockServer::start().await;
    let spreadsheet_id = "1AbC_D-EfGhIJKLmnop";

    Mock::given(method("GET"))
        .and(path(format!("/{spreadsheet_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sheets": [{"properties": {"title": "Leads"}}, {"properties": {"title": "Archive"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{spreadsheet_id}/values/Leads!1:1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["Email", "Name", "Score"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{spreadsheet_id}/values/Leads!2:2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["a@x", "Ada", 42]]
        })))
        .mount(&server)
        .await;

    let resolver = GoogleSheetsResolver::with_base_url(server.uri());
    let req = MetadataRequest {
        credentials: bearer_credentials(),
        params: serde_json::json!({"spreadsheetId": spreadsheet_id}),
        options: serde_json::json!({}),
    };

    let result = resolver.resolve(&reqwest::Client::new(), &req).await;

    assert!(result.success);
    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.columns, vec!["Email", "Name", "Score"]);
    assert_eq!(metadata.sample, Some(serde_json::json!({"Email": "a@x", "Name": "Ada", "Score": 42})));
    assert_eq!(result.extras.unwrap()["selectedTab"], serde_json::json!("Leads"));
}

/// S5 — dynamic-options dependency check. A call missing a declared
/// dependency fails with 400 before the handler ever runs; a follow-up
/// call with the dependency satisfied invokes the handler; a third call
/// within the TTL window is served from cache.
#[tokio::test]
async fn s5_dynamic_options_dependency_check() {
    let service = DynamicOptionsService::new();
    let invocation_count = Arc::new(AtomicU32::new(0));
    {
        let invocation_count = invocation_count.clone();
        service.register_handler(
            "listIssues",
            Arc::new(move |_ctx: OptionContext| {
                let invocation_count = invocation_count.clone();
                async move {
                    invocation_count.fetch_add(1, Ordering::SeqCst);
                    DynamicOptionResult::ok(vec![DynamicOption::new("ISSUE-1", "Issue 1")])
                }
                .boxed()
            }),
        );
    }

    let entry = ConnectorEntry {
        id: "jira".into(),
        display_name: "Jira".into(),
        category: "productivity".into(),
        pricing_tier: PricingTier::Free,
        availability: ConnectorAvailability::Stable,
        lifecycle: ConnectorLifecycle::Active,
        scopes: vec![],
        authentication: AuthenticationScheme::BearerOAuth,
        actions: vec![],
        triggers: vec![],
        dynamic_option_configs: vec![DynamicOptionConfig {
            handler_id: "listIssues".into(),
            parameter_path: "issueId".into(),
            depends_on: vec!["projectId".into()],
            label_field: None,
            value_field: None,
            search_param: None,
            cache_ttl_ms: 60_000,
        }],
        rate_limit_rules: None,
    };

    let base_request = |deps: std::collections::BTreeMap<String, serde_json::Value>| DynamicOptionsRequest {
        connection_id: "conn_1".into(),
        user_id: "user_1".into(),
        organization_id: "org_1".into(),
        parameter_path: "issueId".into(),
        context: OptionContext { dependencies: deps, search: None, cursor: None, limit: None },
        cache_ttl_ms: None,
        force_refresh: false,
    };

    let missing_dep = service.get_dynamic_options("jira", &entry, base_request(Default::default())).await;
    assert!(missing_dep.is_err());
    assert_eq!(missing_dep.unwrap_err().status_code, Some(400));
    assert_eq!(invocation_count.load(Ordering::SeqCst), 0);

    let mut deps = std::collections::BTreeMap::new();
    deps.insert("projectId".to_string(), serde_json::json!("P1"));

    let first = service.get_dynamic_options("jira", &entry, base_request(deps.clone())).await.unwrap();
    assert!(first.success);
    assert!(!first.cached);
    assert_eq!(invocation_count.load(Ordering::SeqCst), 1);

    let second = service.get_dynamic_options("jira", &entry, base_request(deps)).await.unwrap();
    assert!(second.cached);
    assert_eq!(invocation_count.load(Ordering::SeqCst), 1);
}

/// S6 — retry ladder: 503, then 502, then 200. Three attempts total, with
/// the retry hook invoked for the first two failures before the final
/// success is returned.
#[tokio::test]
async fn s6_retry_ladder() {
    let call_count = Arc::new(AtomicU32::new(0));
    let retry_attempts = Arc::new(Mutex::new(Vec::new()));

    let retry_attempts_for_hook = retry_attempts.clone();
    let mut policy = RetryPolicy::<serde_json::Value>::default();
    policy.initial_delay_ms = 1;
    policy.max_delay_ms = 2;
    policy.on_retry = Some(Box::new(move |attempt, _resp, delay| {
        retry_attempts_for_hook.lock().unwrap().push((attempt, delay));
    }));

    let call_count_for_op = call_count.clone();
    let resp = with_retries(&policy, move || {
        let call_count_for_op = call_count_for_op.clone();
        async move {
            match call_count_for_op.fetch_add(1, Ordering::SeqCst) {
                0 => cc_core::ApiResponse::<serde_json::Value>::failure("HTTP 503", 503),
                1 => cc_core::ApiResponse::<serde_json::Value>::failure("HTTP 502", 502),
                _ => cc_core::ApiResponse::ok(serde_json::json!({"ok": true}), 200, Default::default()),
            }
        }
    })
    .await;

    assert!(resp.success);
    assert_eq!(resp.status_code, Some(200));
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
    assert_eq!(retry_attempts.lock().unwrap().len(), 2);
}
