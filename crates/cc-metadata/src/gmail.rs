//! Gmail metadata resolver (spec §4.7).

use crate::support::{get_json, require_access_token};
use crate::{MetadataRequest, MetadataResolutionResult, MetadataResolver, ResolvedMetadata};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

const BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Resolves the mailbox's label list and one representative message.
pub struct GmailResolver;

#[async_trait]
impl MetadataResolver for GmailResolver {
    async fn resolve(&self, http: &reqwest::Client, req: &MetadataRequest) -> MetadataResolutionResult {
        let token = match require_access_token(&req.credentials) {
            Ok(t) => t,
            Err(failure) => return failure,
        };

        let labels_doc = match get_json(http, &format!("{BASE_URL}/labels"), token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };
        let labels: Vec<String> = labels_doc["labels"]
            .as_array()
            .map(|labels| labels.iter().filter_map(|l| l["name"].as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut list_url = format!("{BASE_URL}/messages?maxResults=5");
        if let Some(query) = req.param("q") {
            list_url.push_str(&format!("&q={}", urlencoding_minimal(query)));
        }
        let list_doc = match get_json(http, &list_url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };
        let Some(message_id) = list_doc["messages"][0]["id"].as_str() else {
            return MetadataResolutionResult::ok(
                ResolvedMetadata {
                    columns: vec!["From".into(), "To".into(), "Subject".into(), "Date".into(), "Snippet".into(), "Body".into()],
                    headers: None,
                    sample: None,
                    schema: None,
                    derived_from: vec!["api:gmail".to_string()],
                },
                Some(serde_json::json!({"labels": labels})),
            );
        };

        let message_url = format!("{BASE_URL}/messages/{message_id}?format=full");
        let message = match get_json(http, &message_url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };

        let sample = decode_message_sample(&message);

        MetadataResolutionResult::ok(
            ResolvedMetadata {
                columns: vec!["From".into(), "To".into(), "Subject".into(), "Date".into(), "Snippet".into(), "Body".into()],
                headers: None,
                sample: Some(sample),
                schema: None,
                derived_from: vec!["api:gmail".to_string()],
            },
            Some(serde_json::json!({"labels": labels})),
        )
    }
}

fn header_value<'a>(headers: &'a [serde_json::Value], name: &str) -> Option<&'a str> {
    headers.iter().find(|h| h["name"].as_str().is_some_and(|n| n.eq_ignore_ascii_case(name)))?["value"].as_str()
}

fn decode_message_sample(message: &serde_json::Value) -> serde_json::Value {
    let headers: Vec<serde_json::Value> = message["payload"]["headers"].as_array().cloned().unwrap_or_default();
    let snippet = message["snippet"].as_str().unwrap_or_default();

    let body_data = message["payload"]["body"]["data"]
        .as_str()
        .or_else(|| message["payload"]["parts"][0]["body"]["data"].as_str());
    let body = body_data
        .and_then(|data| URL_SAFE_NO_PAD.decode(data).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default();

    serde_json::json!({
        "From": header_value(&headers, "From"),
        "To": header_value(&headers, "To"),
        "Subject": header_value(&headers, "Subject"),
        "Date": header_value(&headers, "Date"),
        "Snippet": snippet,
        "Body": body,
    })
}

/// Minimal query-string escaping sufficient for Gmail's `q` search syntax,
/// avoiding a dependency on a full URL-encoding crate for one call site.
fn urlencoding_minimal(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => other.to_string().bytes().map(|b| format!("%{b:02X}")).collect(),
        })
        .collect()
}
