//! HubSpot metadata resolver (spec §4.7).

use crate::support::{get_json, require_access_token};
use crate::{MetadataRequest, MetadataResolutionResult, MetadataResolver, ResolvedMetadata};
use async_trait::async_trait;

const BASE_URL: &str = "https://api.hubapi.com/crm/v3/properties";

/// Resolves an object type's property list and `{type, label, description}`
/// schema.
pub struct HubspotResolver;

#[async_trait]
impl MetadataResolver for HubspotResolver {
    async fn resolve(&self, http: &reqwest::Client, req: &MetadataRequest) -> MetadataResolutionResult {
        let token = match require_access_token(&req.credentials) {
            Ok(t) => t,
            Err(failure) => return failure,
        };
        let Some(object_type) = req.param("objectType") else {
            return MetadataResolutionResult::failure("missing required param: objectType", 400);
        };

        let url = format!("{BASE_URL}/{object_type}");
        let doc = match get_json(http, &url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };

        let properties = doc["results"].as_array().cloned().unwrap_or_default();
        let columns: Vec<String> =
            properties.iter().filter_map(|p| p["name"].as_str().map(str::to_string)).collect();

        let schema: serde_json::Map<String, serde_json::Value> = properties
            .iter()
            .filter_map(|p| {
                let name = p["name"].as_str()?.to_string();
                Some((
                    name,
                    serde_json::json!({
                        "type": p["type"],
                        "label": p["label"],
                        "description": p["description"],
                    }),
                ))
            })
            .collect();

        MetadataResolutionResult::ok(
            ResolvedMetadata {
                columns,
                headers: None,
                sample: None,
                schema: Some(serde_json::Value::Object(schema)),
                derived_from: vec!["api:hubspot".to_string()],
            },
            Some(serde_json::json!({"objectType": object_type})),
        )
    }
}
