//! RBAC / organization-context guard (spec §4.10, C10).

use cc_core::{permissions_for_role_str, Permission};
use cc_error::ConnectorError;

/// One of the caller's organization memberships (spec §4.10 step 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgMembership {
    /// Organization id.
    pub organization_id: String,
    /// Role name within that organization.
    pub role: String,
    /// Membership status, e.g. `"active"`, `"suspended"`.
    pub status: String,
}

impl OrgMembership {
    fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Resolved caller identity attached to the request context (spec §4.10
/// step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Authenticated user id.
    pub user_id: String,
    /// Selected organization, if one was resolved.
    pub organization: Option<OrgMembership>,
    /// Permissions granted by the selected organization's role.
    pub permissions: Vec<Permission>,
}

impl CallerContext {
    /// Reject with an auth error if `permission` is not granted (spec §4.10
    /// step 4).
    pub fn require_permission(&self, permission: Permission) -> Result<(), ConnectorError> {
        if self.permissions.contains(&permission) {
            Ok(())
        } else {
            Err(ConnectorError::auth(format!("missing permission: {}", permission.as_str())).with_status(403))
        }
    }

    /// Reject if no organization is resolved or it is not active (spec
    /// §4.10 step 5).
    pub fn require_organization_context(&self) -> Result<&OrgMembership, ConnectorError> {
        match &self.organization {
            Some(org) if org.is_active() => Ok(org),
            Some(_) => Err(ConnectorError::auth("organization is not active").with_status(403)),
            None => Err(ConnectorError::auth("no organization context").with_status(403)),
        }
    }
}

/// Resolves a caller's bearer-token identity and memberships into a
/// [`CallerContext`] (spec §4.10).
pub struct RbacGuard;

impl RbacGuard {
    /// Select the active organization — the explicit `X-Organization-Id`
    /// header if given, else the user's default — and build the caller
    /// context. Rejects if the user is not a member of the requested
    /// organization (spec §4.10 step 2).
    pub fn resolve(
        user_id: impl Into<String>,
        memberships: &[OrgMembership],
        requested_org_id: Option<&str>,
        default_org_id: Option<&str>,
    ) -> Result<CallerContext, ConnectorError> {
        let user_id = user_id.into();
        let target = requested_org_id.or(default_org_id);

        let organization = match target {
            Some(org_id) => Some(
                memberships
                    .iter()
                    .find(|m| m.organization_id == org_id)
                    .cloned()
                    .ok_or_else(|| {
                        ConnectorError::auth(format!("user is not a member of organization {org_id}")).with_status(403)
                    })?,
            ),
            None => None,
        };

        let permissions = organization
            .as_ref()
            .map(|org| permissions_for_role_str(&org.role).to_vec())
            .unwrap_or_default();

        Ok(CallerContext { user_id, organization, permissions })
    }
}
