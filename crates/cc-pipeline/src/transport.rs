//! Request construction: URL resolution, header composition, and body
//! serialization (spec §4.1 steps 1, 5, 6).

use std::collections::BTreeMap;

/// A request body, pre-shaped by the caller per spec §4.1 step 6.
pub enum RequestBody {
    /// `undefined|null → no body`.
    None,
    /// JSON-serialized, `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Pre-encoded `application/x-www-form-urlencoded` body (the
    /// `URLSearchParams.toString()` case).
    Form(String),
    /// Sent verbatim, no `Content-Type` imposed.
    Text(String),
    /// Raw bytes with a caller-supplied `Content-Type` (the multipart case:
    /// the caller has already built the multipart body and its boundary;
    /// the pipeline does not re-derive or suppress it).
    Raw { bytes: Vec<u8>, content_type: String },
}

/// One outbound call (spec §4.1 `request`/`makeRequest`).
pub struct RequestCall<'a> {
    /// HTTP method.
    pub method: reqwest::Method,
    /// Absolute URL or a path to join against the adapter's base URL.
    pub endpoint: &'a str,
    /// Request body.
    pub body: RequestBody,
    /// Caller headers, applied last (spec §4.1 step 5: "later wins").
    pub extra_headers: BTreeMap<String, String>,
}

impl<'a> RequestCall<'a> {
    /// Build a bodyless call.
    pub fn new(method: reqwest::Method, endpoint: &'a str) -> Self {
        Self { method, endpoint, body: RequestBody::None, extra_headers: BTreeMap::new() }
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attach an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

/// Resolve `endpoint` against `base_url` (spec §4.1 step 1): absolute URLs
/// pass through verbatim, relative ones join with exactly one `/`.
pub fn resolve_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
}

/// Insert `key`/`value`, replacing any existing entry whose name matches
/// case-insensitively (HTTP header names are case-insensitive, so `Authorization`
/// and `authorization` are the same header and the later write must win outright,
/// not coexist as two entries).
fn set_header(headers: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if let Some(existing) = headers.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned() {
        headers.remove(&existing);
    }
    headers.insert(key.to_string(), value.to_string());
}

/// Compose request headers in spec §4.1 step 5's precedence order (later
/// wins, case-insensitively): the built-in defaults, then the adapter's auth
/// headers, then the caller's extra headers.
pub fn compose_headers(
    product_user_agent: &str,
    auth_headers: &BTreeMap<String, String>,
    extra_headers: &BTreeMap<String, String>,
    body: &RequestBody,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    match body {
        RequestBody::Json(_) => {
            set_header(&mut headers, "Content-Type", "application/json");
        }
        RequestBody::Form(_) => {
            set_header(&mut headers, "Content-Type", "application/x-www-form-urlencoded");
        }
        RequestBody::Raw { content_type, .. } => {
            set_header(&mut headers, "Content-Type", content_type);
        }
        RequestBody::None | RequestBody::Text(_) => {}
    }
    set_header(&mut headers, "User-Agent", product_user_agent);

    for (k, v) in auth_headers {
        set_header(&mut headers, k, v);
    }
    for (k, v) in extra_headers {
        set_header(&mut headers, k, v);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_endpoint_is_used_verbatim() {
        assert_eq!(resolve_url("https://api.example.com", "https://other.example.com/x"), "https://other.example.com/x");
    }

    #[test]
    fn relative_endpoint_joins_with_one_slash() {
        assert_eq!(resolve_url("https://api.example.com/", "/v1/tasks"), "https://api.example.com/v1/tasks");
        assert_eq!(resolve_url("https://api.example.com", "v1/tasks"), "https://api.example.com/v1/tasks");
    }

    #[test]
    fn caller_headers_win_over_auth_and_defaults() {
        let mut auth = BTreeMap::new();
        auth.insert("Authorization".to_string(), "Bearer old".to_string());
        let mut extra = BTreeMap::new();
        extra.insert("Authorization".to_string(), "Bearer override".to_string());

        let headers = compose_headers("cc/1.0", &auth, &extra, &RequestBody::None);
        assert_eq!(headers.get("Authorization"), Some(&"Bearer override".to_string()));
        assert_eq!(headers.get("User-Agent"), Some(&"cc/1.0".to_string()));
    }

    #[test]
    fn caller_header_override_is_case_insensitive() {
        let mut auth = BTreeMap::new();
        auth.insert("Authorization".to_string(), "Bearer old".to_string());
        let mut extra = BTreeMap::new();
        extra.insert("authorization".to_string(), "Bearer override".to_string());

        let headers = compose_headers("cc/1.0", &auth, &extra, &RequestBody::None);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("authorization"), Some(&"Bearer override".to_string()));
        assert!(headers.get("Authorization").is_none(), "stale differently-cased entry must not survive");
    }

    #[test]
    fn json_body_sets_content_type() {
        let headers = compose_headers("cc/1.0", &BTreeMap::new(), &BTreeMap::new(), &RequestBody::Json(serde_json::json!({})));
        assert_eq!(headers.get("Content-Type"), Some(&"application/json".to_string()));
    }
}
