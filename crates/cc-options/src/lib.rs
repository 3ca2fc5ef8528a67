//! Dynamic options service (spec §4.8, C9): per-`(connectorId, connectionId,
//! handlerId, context)` TTL-cached resolution of a form field's option list.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cc_core::{ConnectorEntry, DynamicOptionResult};
use cc_error::{ConnectorError, ErrorKind};
use futures::future::BoxFuture;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// The per-field context a handler resolves against: values of fields the
/// target field depends on, plus optional search/pagination inputs.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OptionContext {
    /// Values of the fields named in the config's `dependsOn`.
    pub dependencies: BTreeMap<String, serde_json::Value>,
    /// Free-text search term, for connectors that support it.
    pub search: Option<String>,
    /// Opaque pagination cursor.
    pub cursor: Option<String>,
    /// Page size hint.
    pub limit: Option<u32>,
}

/// One resolution request (spec §4.8 `getDynamicOptions`).
pub struct DynamicOptionsRequest {
    /// Connection whose credentials the handler will use.
    pub connection_id: String,
    /// Caller's user id.
    pub user_id: String,
    /// Caller's organization id.
    pub organization_id: String,
    /// Dot-path of the form field being resolved.
    pub parameter_path: String,
    /// Dependency/search/pagination context.
    pub context: OptionContext,
    /// Caller-supplied TTL override; falls back to the config's `cacheTtlMs`.
    pub cache_ttl_ms: Option<u64>,
    /// Bypass the cache and force a fresh resolution.
    pub force_refresh: bool,
}

/// A registered dynamic-option handler: resolves one field's options given
/// its context. Adapters build these the same way they build `cc-registry`
/// handlers — closing over adapter/connection state.
pub type OptionHandler = Arc<dyn Fn(OptionContext) -> BoxFuture<'static, DynamicOptionResult> + Send + Sync>;

struct CacheEntry {
    result: DynamicOptionResult,
    expires_at: Instant,
}

/// Resolves dynamic-option fields, enforcing the config's `dependsOn`
/// requirement and caching successful resolutions by content hash (spec
/// §4.8 step 3; spec §5: "process-wide, keyed as in §4.8; entries are
/// immutable once written and expire by wall-clock TTL").
#[derive(Default)]
pub struct DynamicOptionsService {
    handlers: RwLock<HashMap<String, OptionHandler>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl DynamicOptionsService {
    /// Build an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `handler_id`.
    pub fn register_handler(&self, handler_id: impl Into<String>, handler: OptionHandler) {
        self.handlers.write().expect("options registry lock poisoned").insert(handler_id.into(), handler);
    }

    /// Resolve one field's options against `entry`'s declared config for
    /// `request.parameter_path` (spec §4.8 steps 1-5).
    pub async fn get_dynamic_options(
        &self,
        connector_id: &str,
        entry: &ConnectorEntry,
        request: DynamicOptionsRequest,
    ) -> Result<DynamicOptionResult, ConnectorError> {
        let config = entry.dynamic_option_config(&request.parameter_path).ok_or_else(|| {
            ConnectorError::new(
                ErrorKind::Validation,
                format!("no dynamic-option config for parameter '{}'", request.parameter_path),
            )
            .with_status(404)
        })?;

        let missing: Vec<&str> = config
            .depends_on
            .iter()
            .filter(|key| {
                !request.context.dependencies.get(*key).is_some_and(|v| !is_blank(v))
            })
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ConnectorError::validation(format!(
                "missing required context dependencies: {}",
                missing.join(", ")
            ))
            .with_status(400));
        }

        let ttl_ms = request.cache_ttl_ms.unwrap_or(config.cache_ttl_ms);
        let key = cache_key(connector_id, &request.connection_id, &config.handler_id, &request.context);

        if !request.force_refresh {
            if let Some(cached) = self.fresh_cache_hit(&key) {
                return Ok(cached.with_cached(true));
            }
        }

        let handler = self
            .handlers
            .read()
            .expect("options registry lock poisoned")
            .get(&config.handler_id)
            .cloned()
            .ok_or_else(|| {
                ConnectorError::validation(format!("no handler registered for '{}'", config.handler_id)).with_status(404)
            })?;

        let result = handler(request.context).await;

        if result.success {
            debug!(target: "cc.options", key = %key, ttl_ms, "caching dynamic-option result");
            self.cache.lock().expect("options cache lock poisoned").insert(
                key,
                CacheEntry { result: result.clone(), expires_at: Instant::now() + Duration::from_millis(ttl_ms) },
            );
        }

        Ok(result)
    }

    fn fresh_cache_hit(&self, key: &str) -> Option<DynamicOptionResult> {
        let cache = self.cache.lock().expect("options cache lock poisoned");
        let entry = cache.get(key)?;
        (entry.expires_at > Instant::now()).then(|| entry.result.clone())
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn cache_key(connector_id: &str, connection_id: &str, handler_id: &str, context: &OptionContext) -> String {
    let canonical = serde_json::json!({
        "connectorId": connector_id,
        "connectionId": connection_id,
        "handlerId": handler_id,
        "dependencies": context.dependencies,
        "search": context.search,
        "cursor": context.cursor,
        "limit": context.limit,
    })
    .to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::{AuthenticationScheme, ConnectorAvailability, ConnectorLifecycle, DynamicOptionConfig, PricingTier};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry_with_config() -> ConnectorEntry {
        ConnectorEntry {
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
        }
    }

    fn request(dependencies: BTreeMap<String, serde_json::Value>) -> DynamicOptionsRequest {
        DynamicOptionsRequest {
            connection_id: "conn_1".into(),
            user_id: "user_1".into(),
            organization_id: "org_1".into(),
            parameter_path: "issueId".into(),
            context: OptionContext { dependencies, search: None, cursor: None, limit: None },
            cache_ttl_ms: None,
            force_refresh: false,
        }
    }

    #[tokio::test]
    async fn unknown_parameter_path_is_404() {
        let service = DynamicOptionsService::new();
        let entry = entry_with_config();
        let mut req = request(BTreeMap::new());
        req.parameter_path = "other".into();
        let err = service.get_dynamic_options("jira", &entry, req).await.unwrap_err();
        assert_eq!(err.status_code, Some(404));
    }

    #[tokio::test]
    async fn missing_dependency_is_400_and_names_the_key() {
        let service = DynamicOptionsService::new();
        let entry = entry_with_config();
        let err = service.get_dynamic_options("jira", &entry, request(BTreeMap::new())).await.unwrap_err();
        assert_eq!(err.status_code, Some(400));
        assert!(err.message.contains("projectId"));
    }

    #[tokio::test]
    async fn second_call_hits_handler_third_call_is_cached() {
        let service = DynamicOptionsService::new();
        let entry = entry_with_config();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        service.register_handler(
            "listIssues",
            Arc::new(move |_ctx| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async { DynamicOptionResult::ok(vec![cc_core::DynamicOption::new("1", "Issue 1")]) }.boxed()
            }),
        );

        let mut deps = BTreeMap::new();
        deps.insert("projectId".to_string(), serde_json::json!("P1"));

        let first = service.get_dynamic_options("jira", &entry, request(deps.clone())).await.unwrap();
        assert!(first.success);
        assert!(!first.cached);

        let second = service.get_dynamic_options("jira", &entry, request(deps)).await.unwrap();
        assert!(second.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
