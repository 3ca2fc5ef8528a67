//! Execution Facade (spec §4.11, C11): the thin public surface that glues
//! the handler registry, metadata resolvers, and dynamic-options service
//! onto the pipeline with a caller context.
//!
//! Data flow (spec §4.11): `Caller → RBAC/org check → facade → registry →
//! adapter code → pipeline → … → envelope → facade → Caller`.

use cc_core::{ApiResponse, Credentials, DynamicOptionResult, Permission};
use cc_error::ConnectorError;
use cc_metadata::{MetadataRegistry, MetadataRequest, MetadataResolutionResult};
use cc_options::{DynamicOptionsRequest, DynamicOptionsService};
use cc_policy::CallerContext;
use cc_registry::HandlerRegistry;
use std::sync::Arc;

/// One connection's registry/options/metadata collaborators, bound together
/// for a single caller's execution (spec §4.11: "binds C6..C9 onto C5 with a
/// caller context").
pub struct ExecutionFacade {
    registry: Arc<HandlerRegistry>,
    options: Arc<DynamicOptionsService>,
    metadata: Arc<MetadataRegistry>,
    credentials: Credentials,
}

impl ExecutionFacade {
    /// Bind a caller's registry/options/metadata collaborators and working
    /// credential copy.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        options: Arc<DynamicOptionsService>,
        metadata: Arc<MetadataRegistry>,
        credentials: Credentials,
    ) -> Self {
        Self { registry, options, metadata, credentials }
    }

    /// `execute(operationId, params)` (spec §4.11), gated by the caller's
    /// permission for invoking connector operations.
    pub async fn execute(
        &self,
        caller: &CallerContext,
        required_permission: Permission,
        operation_id: &str,
        params: serde_json::Value,
    ) -> ApiResponse {
        if let Err(err) = caller.require_permission(required_permission) {
            return envelope_for_error(err);
        }
        self.registry.execute(operation_id, params).await
    }

    /// `getDynamicOptions(handlerId, context)` (spec §4.11), delegating to
    /// the dynamic-options service for one connector entry's field config.
    pub async fn get_dynamic_options(
        &self,
        connector_id: &str,
        entry: &cc_core::ConnectorEntry,
        request: DynamicOptionsRequest,
    ) -> Result<DynamicOptionResult, ConnectorError> {
        self.options.get_dynamic_options(connector_id, entry, request).await
    }

    /// `resolveMetadata` (spec §4.7, surfaced through the facade per §4.11's
    /// "resolver + registry lookups").
    pub async fn resolve_metadata(&self, connector_id: &str, request: &MetadataRequest) -> MetadataResolutionResult {
        self.metadata.resolve(connector_id, request).await
    }

    /// `updateCredentials(partial)` (spec §4.11): merge a partial credential
    /// update (e.g. the result of a completed OAuth flow) into the working
    /// copy.
    pub fn update_credentials(&mut self, partial: &Credentials) {
        self.credentials.merge(partial);
    }

    /// The facade's current working credential copy.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

fn envelope_for_error(err: ConnectorError) -> ApiResponse {
    match err.status_code {
        Some(status) => ApiResponse::failure(err.message, status),
        None => ApiResponse::transport_error(err.message),
    }
}
