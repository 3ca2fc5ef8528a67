//! Shared discovery-call plumbing used by every resolver (spec §4.7 steps
//! 1-3): pull an access token, call the vendor, map 401/403 to an auth
//! failure.

use crate::MetadataResolutionResult;
use cc_core::Credentials;

/// Pull the bearer token a resolver needs from `credentials`, failing with
/// the standard 400 envelope if absent (spec §4.7 step 1).
pub fn require_access_token(credentials: &Credentials) -> Result<&str, MetadataResolutionResult> {
    credentials
        .access_token()
        .ok_or_else(|| MetadataResolutionResult::failure("missing accessToken credential", 400))
}

/// `GET url` with a bearer token, mapping 401/403 to the vendor-auth-failed
/// shape (spec §4.7 step 3) and any other transport/parse failure to a
/// generic resolver error.
pub async fn get_json(
    http: &reqwest::Client,
    url: &str,
    access_token: &str,
) -> Result<serde_json::Value, MetadataResolutionResult> {
    let response = http
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| MetadataResolutionResult::failure(format!("request to {url} failed: {e}"), 0))?;

    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(MetadataResolutionResult::failure("vendor authentication failed", status.as_u16()));
    }
    if !status.is_success() {
        return Err(MetadataResolutionResult::failure(format!("vendor returned HTTP {status}"), status.as_u16()));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| MetadataResolutionResult::failure(format!("could not parse vendor response: {e}"), 0))
}
