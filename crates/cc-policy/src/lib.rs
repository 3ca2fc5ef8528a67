//! Pre-request policy gates: the network allowlist (C1, spec §4.9) and the
//! RBAC / organization-context guard (C10, spec §4.10).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allowlist;
mod rbac;

pub use allowlist::{admit, AuditEvent, AuditSink, CallIdentifiers, NoopAuditSink};
pub use rbac::{CallerContext, OrgMembership, RbacGuard};
