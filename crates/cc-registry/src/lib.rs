//! Handler registry (spec §4.5, C6): a case-insensitive `operationId →
//! handler` map per adapter instance, plus alias registration and
//! dispatch.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cc_core::ApiResponse;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// A registered operation handler: takes the call's params and resolves to
/// an [`ApiResponse`]. Adapters build these by closing over their own state
/// (base URL, a pipeline handle, credentials accessor, …).
pub type Handler = Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, ApiResponse> + Send + Sync>;

/// Case-insensitive `operationId → handler` map (spec §4.5). No state is
/// shared across calls except the credential bag and governor/manager
/// singletons the handlers themselves close over.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single handler under `id`, lowercased.
    pub fn register_handler(&self, id: impl Into<String>, handler: Handler) {
        self.handlers.write().expect("registry lock poisoned").insert(id.into().to_lowercase(), handler);
    }

    /// Register many handlers at once.
    pub fn register_handlers(&self, entries: impl IntoIterator<Item = (String, Handler)>) {
        for (id, handler) in entries {
            self.register_handler(id, handler);
        }
    }

    /// Register `alias` as pointing at the handler already registered under
    /// `method_name`. Fails fast if `method_name` has no handler yet (spec
    /// §4.5: "looks up `methodName` on the adapter instance and fails fast
    /// if absent").
    pub fn register_alias_handlers(
        &self,
        aliases: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), String> {
        for (alias, method_name) in aliases {
            let method_key = method_name.to_lowercase();
            let handler = self
                .handlers
                .read()
                .expect("registry lock poisoned")
                .get(&method_key)
                .cloned()
                .ok_or_else(|| format!("alias '{alias}' references unknown handler '{method_name}'"))?;
            self.register_handler(alias, handler);
        }
        Ok(())
    }

    /// Returns `true` if a handler is registered under `id` (case-insensitive).
    pub fn contains(&self, id: &str) -> bool {
        self.handlers.read().expect("registry lock poisoned").contains_key(&id.to_lowercase())
    }

    /// Dispatch `operation_id` with `params` (spec §4.5 `execute`):
    /// 1. Lowercase the id and look up its handler.
    /// 2. If absent, return a failure envelope naming the unknown handler.
    /// 3. Await the handler, catching panics into a transport-failure
    ///    envelope (`statusCode = 0`) rather than unwinding past the
    ///    registry.
    pub async fn execute(&self, operation_id: &str, params: serde_json::Value) -> ApiResponse {
        let key = operation_id.to_lowercase();
        let handler = self.handlers.read().expect("registry lock poisoned").get(&key).cloned();

        let Some(handler) = handler else {
            return ApiResponse::failure(format!("Unknown function handler: {operation_id}"), 0);
        };

        match AssertUnwindSafe(handler(params)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(&panic);
                warn!(target: "cc.registry", operation_id, message, "handler panicked");
                ApiResponse::transport_error(format!("handler panicked: {message}"))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_handler() -> Handler {
        Arc::new(|params: serde_json::Value| {
            async move { ApiResponse::ok(params, 200, Default::default()) }.boxed()
        })
    }

    #[tokio::test]
    async fn executes_registered_handler() {
        let registry = HandlerRegistry::new();
        registry.register_handler("listProjects", ok_handler());

        let resp = registry.execute("listProjects", serde_json::json!({"a": 1})).await;
        assert!(resp.success);
        assert_eq!(resp.data, Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let registry = HandlerRegistry::new();
        registry.register_handler("ListProjects", ok_handler());

        let resp = registry.execute("LISTPROJECTS", serde_json::json!(null)).await;
        assert!(resp.success);
    }

    #[tokio::test]
    async fn unknown_handler_reports_its_id() {
        let registry = HandlerRegistry::new();
        let resp = registry.execute("doesNotExist", serde_json::json!(null)).await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Unknown function handler: doesNotExist"));
        assert_eq!(resp.status_code, Some(0));
    }

    #[tokio::test]
    async fn alias_points_at_existing_handler() {
        let registry = HandlerRegistry::new();
        registry.register_handler("listProjects", ok_handler());
        registry
            .register_alias_handlers([("getProjects".to_string(), "listProjects".to_string())])
            .unwrap();

        let resp = registry.execute("getProjects", serde_json::json!(null)).await;
        assert!(resp.success);
    }

    #[tokio::test]
    async fn alias_to_missing_method_fails_fast() {
        let registry = HandlerRegistry::new();
        let err = registry
            .register_alias_handlers([("getProjects".to_string(), "nope".to_string())])
            .unwrap_err();
        assert!(err.contains("nope"));
    }

    #[tokio::test]
    async fn panicking_handler_becomes_transport_failure() {
        let registry = HandlerRegistry::new();
        let handler: Handler = Arc::new(|_params| async move { panic!("boom") }.boxed());
        registry.register_handler("crashy", handler);

        let resp = registry.execute("crashy", serde_json::json!(null)).await;
        assert!(!resp.success);
        assert_eq!(resp.status_code, Some(0));
        assert!(resp.error.as_deref().unwrap().contains("boom"));
    }
}
