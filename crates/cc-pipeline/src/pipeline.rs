//! The request pipeline proper (spec §4.1 `request`/`makeRequest`, C5):
//! resolves a URL, clears the allowlist gate, refreshes tokens, acquires a
//! rate-limit slot, composes headers, sends the call, runs response
//! middleware, and folds the result into the uniform envelope.

use crate::middleware::{MiddlewareChain, MiddlewareContext};
use crate::transport::{compose_headers, resolve_url, RequestBody, RequestCall};
use cc_connector::ConnectorAdapter;
use cc_core::{ApiResponse, ConnectorEntry, Credentials};
use cc_error::{ConnectorError, ErrorKind};
use cc_oauth::{NoopCallback, TokenRefreshManager};
use cc_policy::{admit, AuditSink, CallIdentifiers, NoopAuditSink};
use cc_ratelimit::RateLimitGovernor;
use cc_retry::{with_retries, RetryPolicy};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Identifiers carried through one call for audit, rate-limit scoping, and
/// token-refresh persistence.
pub struct CallScope<'a> {
    /// Connection whose credentials the call runs under.
    pub connection_id: &'a str,
    /// Organization on whose behalf the call is made.
    pub organization_id: &'a str,
    /// Caller's user id, for audit events.
    pub user_id: Option<&'a str>,
}

/// Shared, process-wide collaborators every pipeline call goes through.
pub struct Pipeline {
    http: reqwest::Client,
    governor: Arc<RateLimitGovernor>,
    token_manager: Arc<TokenRefreshManager>,
    middleware: MiddlewareChain,
    product_user_agent: String,
}

impl Pipeline {
    /// Build a pipeline over shared governor/token-refresh singletons.
    pub fn new(
        http: reqwest::Client,
        governor: Arc<RateLimitGovernor>,
        token_manager: Arc<TokenRefreshManager>,
        middleware: MiddlewareChain,
        product_user_agent: impl Into<String>,
    ) -> Self {
        Self { http, governor, token_manager, middleware, product_user_agent: product_user_agent.into() }
    }

    /// Run one call through the retry combinator (spec §4.1 `request`),
    /// re-invoking [`Pipeline::make_request`] per the adapter's retry policy.
    pub async fn request(
        &self,
        adapter: &dyn ConnectorAdapter,
        entry: &ConnectorEntry,
        credentials: &mut Credentials,
        scope: &CallScope<'_>,
        mut build_call: impl FnMut() -> RequestCall<'static>,
        retry_policy: &RetryPolicy<serde_json::Value>,
        audit: &dyn AuditSink,
    ) -> ApiResponse<serde_json::Value> {
        with_retries(retry_policy, || {
            let call = build_call();
            self.make_request(adapter, entry, credentials, scope, call, audit)
        })
        .await
    }

    /// Execute exactly one HTTP call with no retry (spec §4.1 `makeRequest`):
    /// resolve URL → allowlist gate → token refresh → rate-limit acquire →
    /// header composition → send → response middleware → envelope.
    pub async fn make_request(
        &self,
        adapter: &dyn ConnectorAdapter,
        entry: &ConnectorEntry,
        credentials: &mut Credentials,
        scope: &CallScope<'_>,
        call: RequestCall<'_>,
        audit: &dyn AuditSink,
    ) -> ApiResponse<serde_json::Value> {
        let url = resolve_url(adapter.base_url(), call.endpoint);

        if let Err(err) = admit(
            &url,
            &credentials.network_allowlist(),
            &CallIdentifiers {
                organization_id: Some(scope.organization_id),
                connection_id: Some(scope.connection_id),
                user_id: scope.user_id,
            },
            audit,
        ) {
            return envelope_for_error(err);
        }

        if let Err(err) = self
            .token_manager
            .maybe_refresh(credentials, scope.connection_id, &NoopCallback)
            .await
        {
            return envelope_for_error(err);
        }

        let auth_headers = match adapter.auth_headers(credentials) {
            Ok(headers) => headers,
            Err(err) => return envelope_for_error(err),
        };
        let query_auth_params = adapter.query_auth_params(credentials);

        let rules = entry.effective_rate_limit_rules();
        let acquisition = self
            .governor
            .acquire(adapter.id(), scope.connection_id, scope.organization_id, &rules)
            .await;
        debug!(
            target: "cc.pipeline",
            connector = adapter.id(),
            attempts = acquisition.attempts,
            wait_ms = acquisition.wait_ms,
            "admitted into rate-limit scope"
        );

        let url = append_query_params(&url, &query_auth_params);
        let headers = compose_headers(&self.product_user_agent, &auth_headers, &call.extra_headers, &call.body);

        let response = self.send(&call.method, &url, &headers, &call.body).await;
        acquisition.release();

        let response = match response {
            Ok(r) => r,
            Err(err) => return envelope_for_error(err),
        };

        let status = response.status().as_u16();
        let response_headers = lower_case_headers(response.headers());
        let body_text = response.text().await.unwrap_or_default();

        let ctx = MiddlewareContext {
            status,
            headers: &response_headers,
            connector_id: adapter.id(),
            connection_id: scope.connection_id,
            organization_id: scope.organization_id,
            rate_limit_rules: &rules,
        };
        self.middleware.run(&ctx).await;

        envelope_from_http(status, response_headers, &body_text)
    }

    async fn send(
        &self,
        method: &reqwest::Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &RequestBody,
    ) -> Result<reqwest::Response, ConnectorError> {
        let mut builder = self.http.request(method.clone(), url);
        for (k, v) in headers {
            builder = builder.header(k, v);
        }
        builder = match body {
            RequestBody::None => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(encoded) => builder.body(encoded.clone()),
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Raw { bytes, .. } => builder.body(bytes.clone()),
        };

        builder.send().await.map_err(|e| {
            let mut err = ConnectorError::new(ErrorKind::TransientHttp, e.to_string());
            if let Some(status) = e.status() {
                err = err.with_status(status.as_u16());
            }
            err
        })
    }
}

fn append_query_params(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    let encoded: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();
    format!("{url}{separator}{}", encoded.join("&"))
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn lower_case_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string())))
        .collect()
}

/// Fold an observed HTTP status/body into the uniform envelope (spec §4.1
/// step 8): 2xx → success; otherwise a failure carrying the parsed body, if
/// any, as diagnostic data.
fn envelope_from_http(status: u16, headers: BTreeMap<String, String>, body_text: &str) -> ApiResponse<serde_json::Value> {
    let parsed = serde_json::from_str::<serde_json::Value>(body_text)
        .unwrap_or_else(|_| serde_json::Value::String(body_text.to_string()));

    if (200..300).contains(&status) {
        ApiResponse::ok(parsed, status, headers)
    } else {
        let mut resp = ApiResponse::failure_with_data(format!("HTTP {status}"), status, parsed);
        resp.headers = Some(headers);
        resp
    }
}

/// Fold a pre-HTTP [`ConnectorError`] (allowlist denial, refresh failure,
/// missing auth material) into the uniform envelope, preserving its observed
/// status when one exists and otherwise reporting a transport failure.
fn envelope_for_error(err: ConnectorError) -> ApiResponse<serde_json::Value> {
    match err.status_code {
        Some(status) => ApiResponse::failure(err.message, status),
        None => ApiResponse::transport_error(err.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;
    use cc_core::{AuthenticationScheme, ConnectorAvailability, ConnectorLifecycle, PricingTier};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestAdapter {
        id: String,
        base_url: String,
        scheme: AuthenticationScheme,
    }

    impl ConnectorAdapter for TestAdapter {
        fn id(&self) -> &str {
            &self.id
        }
        fn base_url(&self) -> &str {
            &self.base_url
        }
        fn authentication(&self) -> &AuthenticationScheme {
            &self.scheme
        }
    }

    fn entry() -> ConnectorEntry {
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
            rate_limit_rules: None,
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            reqwest::Client::new(),
            Arc::new(RateLimitGovernor::new()),
            Arc::new(TokenRefreshManager::new(reqwest::Client::new(), cc_oauth::DEFAULT_REFRESH_SKEW_MS)),
            MiddlewareChain::new(),
            "cc-test/1.0",
        )
    }

    #[tokio::test]
    async fn successful_call_returns_parsed_json_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let adapter = TestAdapter { id: "acme".into(), base_url: server.uri(), scheme: AuthenticationScheme::BearerOAuth };
        let mut creds = Credentials::new();
        creds.set_access_token("tok");
        let scope = CallScope { connection_id: "conn_1", organization_id: "org_1", user_id: None };

        let resp = pipeline()
            .make_request(
                &adapter,
                &entry(),
                &mut creds,
                &scope,
                RequestCall::new(reqwest::Method::GET, "/v1/projects"),
                &NoopAuditSink,
            )
            .await;

        assert!(resp.success);
        assert_eq!(resp.data.unwrap(), serde_json::json!({"items": []}));
    }

    #[tokio::test]
    async fn non_2xx_is_reported_as_failure_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "not found"})))
            .mount(&server)
            .await;

        let adapter = TestAdapter { id: "acme".into(), base_url: server.uri(), scheme: AuthenticationScheme::BearerOAuth };
        let mut creds = Credentials::new();
        creds.set_access_token("tok");
        let scope = CallScope { connection_id: "conn_1", organization_id: "org_1", user_id: None };

        let resp = pipeline()
            .make_request(
                &adapter,
                &entry(),
                &mut creds,
                &scope,
                RequestCall::new(reqwest::Method::GET, "/v1/projects"),
                &NoopAuditSink,
            )
            .await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, Some(404));
        assert_eq!(resp.data.unwrap(), serde_json::json!({"error": "not found"}));
    }

    #[tokio::test]
    async fn missing_auth_material_fails_before_any_http_call() {
        let server = MockServer::start().await;
        let adapter = TestAdapter { id: "acme".into(), base_url: server.uri(), scheme: AuthenticationScheme::BearerOAuth };
        let mut creds = Credentials::new();
        let scope = CallScope { connection_id: "conn_1", organization_id: "org_1", user_id: None };

        let resp = pipeline()
            .make_request(
                &adapter,
                &entry(),
                &mut creds,
                &scope,
                RequestCall::new(reqwest::Method::GET, "/v1/projects"),
                &NoopAuditSink,
            )
            .await;

        assert!(!resp.success);
        assert_eq!(resp.status_code, Some(0));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
