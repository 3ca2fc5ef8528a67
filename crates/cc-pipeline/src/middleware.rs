//! Response middleware chain (spec §4.1 step 7, §9 "Response middleware
//! chain" design note): an ordered list of handlers sharing a mutable
//! context struct, run after every HTTP call and before the envelope is
//! returned to the adapter.

use async_trait::async_trait;
use cc_core::RateLimitRules;
use cc_ratelimit::RateLimitGovernor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared, mutable context passed through the middleware chain.
pub struct MiddlewareContext<'a> {
    /// Observed HTTP status code.
    pub status: u16,
    /// Response headers, lower-cased keys.
    pub headers: &'a BTreeMap<String, String>,
    /// Connector id the call was made against.
    pub connector_id: &'a str,
    /// Connection whose credentials were used.
    pub connection_id: &'a str,
    /// Organization on whose behalf the call was made.
    pub organization_id: &'a str,
    /// Rate-limit rules in effect for this scope.
    pub rate_limit_rules: &'a RateLimitRules,
}

/// One response middleware (spec §4.1 step 7: "{response, request,
/// connectorId, connectionId, organizationId, rateLimits}").
#[async_trait]
pub trait ResponseMiddleware: Send + Sync {
    /// Observe (and never mutate response bytes for) one completed call.
    async fn on_response(&self, ctx: &MiddlewareContext<'_>);

    /// Name used in tracing output.
    fn name(&self) -> &str;
}

/// An ordered chain of [`ResponseMiddleware`], run in registration order
/// (spec §5: "Response middlewares run in registration order and complete
/// before the envelope is returned to the adapter").
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn ResponseMiddleware>>,
}

impl MiddlewareChain {
    /// Build an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware (builder pattern).
    #[must_use]
    pub fn with(mut self, middleware: impl ResponseMiddleware + 'static) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// Run every middleware against one completed call's context.
    pub async fn run(&self, ctx: &MiddlewareContext<'_>) {
        for middleware in &self.middlewares {
            tracing::debug!(target: "cc.pipeline", middleware = %middleware.name(), "running response middleware");
            middleware.on_response(ctx).await;
        }
    }
}

/// Built-in middleware (spec §4.1 step 7: "One built-in middleware feeds C2
/// with header metadata and triggers 429 penalty scheduling") that reports
/// every response back to the rate governor.
pub struct RateLimitFeedbackMiddleware {
    governor: Arc<RateLimitGovernor>,
}

impl RateLimitFeedbackMiddleware {
    /// Build a feedback middleware over a shared governor.
    pub fn new(governor: Arc<RateLimitGovernor>) -> Self {
        Self { governor }
    }
}

#[async_trait]
impl ResponseMiddleware for RateLimitFeedbackMiddleware {
    async fn on_response(&self, ctx: &MiddlewareContext<'_>) {
        self.governor
            .record_response(
                ctx.connector_id,
                ctx.connection_id,
                ctx.organization_id,
                ctx.rate_limit_rules,
                ctx.status,
                ctx.headers,
            )
            .await;
    }

    fn name(&self) -> &str {
        "rate-limit-feedback"
    }
}
