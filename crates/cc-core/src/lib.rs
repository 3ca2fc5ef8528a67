//! Shared data model for the connector execution core.
//!
//! This crate carries no behavior beyond small, total helper methods — the
//! request pipeline, rate governor, and token refresh manager live in their
//! own crates and depend on these types rather than the other way around.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connector;
mod credentials;
mod envelope;
mod metadata;
mod options;
mod rbac;

pub use connector::{
    AuthenticationScheme, ConnectorAvailability, ConnectorEntry, ConnectorLifecycle,
    DynamicOptionConfig, PricingTier, RateLimitHeaderOverrides, RateLimitRules, RateLimitScope,
};
pub use credentials::{Credentials, NetworkAllowlist, FIELD_NETWORK_ALLOWLIST};
pub use envelope::{ApiResponse, RateLimitInfo};
pub use metadata::WorkflowNodeMetadata;
pub use options::{DynamicOption, DynamicOptionResult};
pub use rbac::{permissions_for_role_str, Permission, Role};
