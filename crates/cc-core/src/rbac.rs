//! RBAC permission set and role → permission table (spec §3 `Permissions`,
//! §6.5). This module holds only the closed data model; the guard that
//! applies it to an inbound call lives in `cc-policy`.

use serde::{Deserialize, Serialize};

/// The closed set of permissions recognised by the system (spec §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// `workflow:create`
    WorkflowCreate,
    /// `workflow:view`
    WorkflowView,
    /// `workflow:edit`
    WorkflowEdit,
    /// `workflow:deploy`
    WorkflowDeploy,
    /// `workflow:collaborate`
    WorkflowCollaborate,
    /// `connections:read`
    ConnectionsRead,
    /// `connections:write`
    ConnectionsWrite,
    /// `integration:metadata:read`
    IntegrationMetadataRead,
    /// `organization:view_usage`
    OrganizationViewUsage,
    /// `organization:manage` (the remainder of `organization:*` beyond
    /// `view_usage`; owner/admin only — an Open Question decision, see
    /// DESIGN.md).
    OrganizationManage,
    /// `billing:manage` — owner-exclusive (spec §3 invariant).
    BillingManage,
}

impl Permission {
    /// Stable wire string, e.g. `"workflow:create"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowCreate => "workflow:create",
            Self::WorkflowView => "workflow:view",
            Self::WorkflowEdit => "workflow:edit",
            Self::WorkflowDeploy => "workflow:deploy",
            Self::WorkflowCollaborate => "workflow:collaborate",
            Self::ConnectionsRead => "connections:read",
            Self::ConnectionsWrite => "connections:write",
            Self::IntegrationMetadataRead => "integration:metadata:read",
            Self::OrganizationViewUsage => "organization:view_usage",
            Self::OrganizationManage => "organization:manage",
            Self::BillingManage => "billing:manage",
        }
    }
}

/// Organization role (spec §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control, including billing.
    Owner,
    /// Everything but billing.
    Admin,
    /// Can operate workflows and connections day-to-day.
    Member,
    /// Read-only.
    Viewer,
}

impl Role {
    /// Parse a role name, returning `None` for unrecognised strings (the
    /// caller falls back to [`permissions_for_role_str`]'s default set).
    pub fn parse(name: &str) -> Option<Role> {
        match name {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Permissions granted to this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Owner => OWNER_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Member => MEMBER_PERMISSIONS,
            Role::Viewer => VIEWER_PERMISSIONS,
        }
    }
}

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::WorkflowView,
    Permission::OrganizationViewUsage,
    Permission::IntegrationMetadataRead,
];

const MEMBER_PERMISSIONS: &[Permission] = &[
    Permission::WorkflowCreate,
    Permission::WorkflowView,
    Permission::WorkflowEdit,
    Permission::WorkflowDeploy,
    Permission::WorkflowCollaborate,
    Permission::ConnectionsRead,
    Permission::ConnectionsWrite,
    Permission::IntegrationMetadataRead,
    Permission::OrganizationViewUsage,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::WorkflowCreate,
    Permission::WorkflowView,
    Permission::WorkflowEdit,
    Permission::WorkflowDeploy,
    Permission::WorkflowCollaborate,
    Permission::ConnectionsRead,
    Permission::ConnectionsWrite,
    Permission::IntegrationMetadataRead,
    Permission::OrganizationViewUsage,
    Permission::OrganizationManage,
];

const OWNER_PERMISSIONS: &[Permission] = &[
    Permission::WorkflowCreate,
    Permission::WorkflowView,
    Permission::WorkflowEdit,
    Permission::WorkflowDeploy,
    Permission::WorkflowCollaborate,
    Permission::ConnectionsRead,
    Permission::ConnectionsWrite,
    Permission::IntegrationMetadataRead,
    Permission::OrganizationViewUsage,
    Permission::OrganizationManage,
    Permission::BillingManage,
];

/// The fallback permission set for an unrecognised role name (spec §6.5:
/// "Unknown roles fall back to `{workflow:view}`").
pub const UNKNOWN_ROLE_PERMISSIONS: &[Permission] = &[Permission::WorkflowView];

/// Resolve the permission set for a role name, falling back to
/// [`UNKNOWN_ROLE_PERMISSIONS`] for unrecognised names.
pub fn permissions_for_role_str(name: &str) -> &'static [Permission] {
    match Role::parse(name) {
        Some(role) => role.permissions(),
        None => UNKNOWN_ROLE_PERMISSIONS,
    }
}
