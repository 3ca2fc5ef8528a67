//! Network allowlist gate (spec §4.9, C1).

use cc_core::NetworkAllowlist;
use cc_error::ConnectorError;
use serde::Serialize;
use std::net::IpAddr;

/// Identifiers attached to an audit event (spec §4.9 step 5).
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// The hostname that failed the allowlist check.
    pub attempted_host: String,
    /// The full URL the call was attempting to reach.
    pub attempted_url: String,
    /// Fixed reason tag, always `"host_not_allowlisted"` for this gate.
    pub reason: &'static str,
    /// Organization the call was made on behalf of.
    pub organization_id: Option<String>,
    /// Connection whose credentials were in use.
    pub connection_id: Option<String>,
    /// User who triggered the call, if known.
    pub user_id: Option<String>,
    /// The allowlist that was evaluated.
    pub allowlist: NetworkAllowlist,
}

/// Write-only collaborator that records allowlist denials. The core never
/// awaits it (spec §5: "Audit and metrics sinks are write-only ... the core
/// awaits neither").
pub trait AuditSink: Send + Sync {
    /// Record one denial event.
    fn record(&self, event: AuditEvent);
}

/// An [`AuditSink`] that discards every event, for callers with no audit
/// backend configured.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Identifiers carried alongside an admission check, for the audit event.
pub struct CallIdentifiers<'a> {
    /// Organization id, if known.
    pub organization_id: Option<&'a str>,
    /// Connection id, if known.
    pub connection_id: Option<&'a str>,
    /// User id, if known.
    pub user_id: Option<&'a str>,
}

/// Check `url`'s host against `allowlist`, recording a denial via `audit` and
/// returning a [`cc_error::ErrorKind::NetworkBlocked`] error if it is not
/// admitted (spec §4.9).
pub fn admit(
    url: &str,
    allowlist: &NetworkAllowlist,
    ids: &CallIdentifiers<'_>,
    audit: &dyn AuditSink,
) -> Result<(), ConnectorError> {
    if allowlist.is_empty() {
        return Ok(());
    }

    let host = extract_host(url)
        .ok_or_else(|| ConnectorError::validation(format!("cannot parse host from URL: {url}")))?;
    let host = host.to_lowercase();

    let domain_ok = allowlist.domains.iter().any(|entry| domain_matches(entry, &host));
    let ip_ok = host
        .parse::<IpAddr>()
        .is_ok_and(|ip| allowlist.ip_ranges.iter().any(|entry| ip_matches(entry, ip)));

    if domain_ok || ip_ok {
        return Ok(());
    }

    audit.record(AuditEvent {
        attempted_host: host.clone(),
        attempted_url: url.to_string(),
        reason: "host_not_allowlisted",
        organization_id: ids.organization_id.map(str::to_string),
        connection_id: ids.connection_id.map(str::to_string),
        user_id: ids.user_id.map(str::to_string),
        allowlist: allowlist.clone(),
    });

    Err(ConnectorError::network_blocked(format!("host not allowlisted: {host}")))
}

fn extract_host(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme.split(['/', '?', '#']).next()?;
    // Strip userinfo, if present.
    let authority = authority.rsplit_once('@').map(|(_, rest)| rest).unwrap_or(authority);
    if let Some(rest) = authority.strip_prefix('[') {
        // IPv6 literal: "[::1]:8080" or "[::1]".
        return rest.split(']').next().map(str::to_string);
    }
    Some(authority.split(':').next().unwrap_or(authority).to_string())
}

/// Domain-suffix matching per spec §4.9 step 3.
fn domain_matches(entry: &str, host: &str) -> bool {
    let entry = entry.to_lowercase();
    if entry == "*" || entry == host {
        return true;
    }
    if let Some(suffix) = entry.strip_prefix("*.") {
        return host == suffix || host.ends_with(&format!(".{suffix}"));
    }
    host.ends_with(&format!(".{entry}"))
}

/// IP/CIDR matching per spec §4.9 step 4.
fn ip_matches(entry: &str, host_ip: IpAddr) -> bool {
    if let Some((network, prefix_len)) = entry.split_once('/') {
        let Ok(network_ip) = network.parse::<IpAddr>() else { return false };
        let Ok(prefix_len) = prefix_len.parse::<u32>() else { return false };
        return cidr_contains(network_ip, prefix_len, host_ip);
    }
    entry.parse::<IpAddr>().is_ok_and(|entry_ip| entry_ip == host_ip)
}

fn cidr_contains(network: IpAddr, prefix_len: u32, candidate: IpAddr) -> bool {
    match (network, candidate) {
        (IpAddr::V4(net), IpAddr::V4(addr)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
            (u32::from(net) & mask) == (u32::from(addr) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = if prefix_len == 0 { 0u128 } else { u128::MAX << (128 - prefix_len) };
            (u128::from(net) & mask) == (u128::from(addr) & mask)
        }
        _ => false,
    }
}
