//! Single-flight OAuth access-token refresh (spec §4.3, C3).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cc_core::Credentials;
use cc_error::ConnectorError;
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default skew window before expiry at which a refresh is triggered.
pub const DEFAULT_REFRESH_SKEW_MS: i64 = 60_000;

/// The fields updated on a successful token refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    /// The new access token.
    pub access_token: String,
    /// A rotated refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
    /// New expiry, epoch milliseconds.
    pub expires_at_ms: i64,
}

/// Called after a successful refresh so the credential store can persist the
/// update (spec §4.3 `onTokenRefreshed`).
#[async_trait::async_trait]
pub trait OnTokenRefreshed: Send + Sync {
    /// Persist the refreshed token fields.
    async fn call(&self, outcome: &RefreshOutcome);
}

/// An [`OnTokenRefreshed`] that does nothing, for callers with no
/// credential store to notify.
pub struct NoopCallback;

#[async_trait::async_trait]
impl OnTokenRefreshed for NoopCallback {
    async fn call(&self, _outcome: &RefreshOutcome) {}
}

#[derive(Debug, Clone)]
struct RefreshFailure {
    message: String,
    status_code: Option<u16>,
}

type RefreshResult = Result<RefreshOutcome, RefreshFailure>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Process-wide single-flight OAuth refresh manager, keyed by connection id
/// (spec §5: "at most one token refresh is in flight" per credential bag).
pub struct TokenRefreshManager {
    http: reqwest::Client,
    refresh_skew_ms: i64,
    inflight: Mutex<HashMap<String, SharedRefresh>>,
}

impl TokenRefreshManager {
    /// Build a manager using the given HTTP client and refresh skew window.
    pub fn new(http: reqwest::Client, refresh_skew_ms: i64) -> Self {
        Self { http, refresh_skew_ms, inflight: Mutex::new(HashMap::new()) }
    }

    /// Decide whether `credentials` need refreshing right now (spec §4.3
    /// policy).
    pub fn needs_refresh(&self, credentials: &Credentials, now_ms: i64) -> bool {
        let has_refresh_material = credentials.has_refresh_material();
        let near_expiry = credentials
            .expires_at_ms()
            .is_some_and(|exp| exp - now_ms < self.refresh_skew_ms);
        let missing_access_token = credentials.access_token().is_none();

        has_refresh_material && (near_expiry || missing_access_token)
    }

    /// Refresh `credentials` in place if needed, invoking `on_refreshed`
    /// after a successful refresh.
    pub async fn maybe_refresh(
        &self,
        credentials: &mut Credentials,
        connection_id: &str,
        on_refreshed: &dyn OnTokenRefreshed,
    ) -> Result<(), ConnectorError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        if !self.needs_refresh(credentials, now_ms) {
            return Ok(());
        }

        let token_url = credentials
            .token_url()
            .ok_or_else(|| ConnectorError::new(cc_error::ErrorKind::RefreshFailed, "missing tokenUrl for refresh"))?
            .to_string();
        let refresh_token = credentials.refresh_token().unwrap_or_default().to_string();
        let client_id = credentials.client_id().unwrap_or_default().to_string();
        let client_secret = credentials.client_secret().unwrap_or_default().to_string();

        let (outcome, is_owner) = self
            .run_single_flight(connection_id, token_url, refresh_token, client_id, client_secret)
            .await;
        let outcome = outcome.map_err(|failure| {
            let mut err = ConnectorError::new(cc_error::ErrorKind::RefreshFailed, failure.message);
            if let Some(status) = failure.status_code {
                err = err.with_status(status);
            }
            err
        })?;

        credentials.set_access_token(outcome.access_token.clone());
        if let Some(refresh) = &outcome.refresh_token {
            credentials.set_refresh_token(refresh.clone());
        }
        credentials.set_expires_at_ms(outcome.expires_at_ms);

        // Only the caller that actually owns the in-flight exchange reports
        // it; joiners share the same `Shared` future and outcome, and must
        // not re-fire the callback (spec §4.3: "onTokenRefreshed invoked
        // exactly once" per refresh, not once per joiner).
        if is_owner {
            on_refreshed.call(&outcome).await;
        }
        Ok(())
    }

    /// Run the token exchange at most once per `connection_id` for however
    /// many callers are currently waiting on it. Returns the shared result
    /// alongside whether this caller is the one that started the exchange
    /// (as opposed to joining an already in-flight one).
    async fn run_single_flight(
        &self,
        connection_id: &str,
        token_url: String,
        refresh_token: String,
        client_id: String,
        client_secret: String,
    ) -> (RefreshResult, bool) {
        let (shared, is_owner) = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(connection_id) {
                debug!(target: "cc.oauth", connection_id, "joining in-flight refresh");
                (existing.clone(), false)
            } else {
                let http = self.http.clone();
                let fut: BoxFuture<'static, RefreshResult> =
                    Self::exchange(http, token_url, refresh_token, client_id, client_secret).boxed();
                let shared = fut.shared();
                inflight.insert(connection_id.to_string(), shared.clone());
                (shared, true)
            }
        };

        let result = shared.await;
        self.inflight.lock().await.remove(connection_id);
        if result.is_err() {
            warn!(target: "cc.oauth", connection_id, "refresh failed, cleared in-flight slot");
        }
        (result, is_owner)
    }

    async fn exchange(
        http: reqwest::Client,
        token_url: String,
        refresh_token: String,
        client_id: String,
        client_secret: String,
    ) -> RefreshResult {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ];

        let response = http.post(&token_url).form(&form).send().await.map_err(|e| RefreshFailure {
            message: e.to_string(),
            status_code: None,
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(RefreshFailure {
                message: format!("token refresh failed: HTTP {status}: {body}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| RefreshFailure {
            message: format!("malformed token response: {e}"),
            status_code: Some(status.as_u16()),
        })?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        Ok(RefreshOutcome {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_at_ms: now_ms + parsed.expires_in * 1000,
        })
    }
}

impl Default for TokenRefreshManager {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_REFRESH_SKEW_MS)
    }
}
