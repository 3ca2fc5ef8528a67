//! Salesforce metadata resolver (spec §4.7).

use crate::support::{get_json, require_access_token};
use crate::{MetadataRequest, MetadataResolutionResult, MetadataResolver, ResolvedMetadata};
use async_trait::async_trait;

const DEFAULT_API_VERSION: &str = "v59.0";

/// Resolves an sObject's field list and type/label schema via its `describe`
/// endpoint.
pub struct SalesforceResolver;

#[async_trait]
impl MetadataResolver for SalesforceResolver {
    async fn resolve(&self, http: &reqwest::Client, req: &MetadataRequest) -> MetadataResolutionResult {
        let token = match require_access_token(&req.credentials) {
            Ok(t) => t,
            Err(failure) => return failure,
        };
        let Some(instance_url) = req.param("instanceUrl") else {
            return MetadataResolutionResult::failure("missing required param: instanceUrl", 400);
        };
        let Some(object) = req.param("object") else {
            return MetadataResolutionResult::failure("missing required param: object", 400);
        };
        let version = req.param("apiVersion").unwrap_or(DEFAULT_API_VERSION);

        let url = format!("{instance_url}/services/data/{version}/sobjects/{object}/describe");
        let describe = match get_json(http, &url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };

        let fields = describe["fields"].as_array().cloned().unwrap_or_default();
        let columns: Vec<String> = fields.iter().filter_map(|f| f["name"].as_str().map(str::to_string)).collect();

        let schema: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .filter_map(|f| {
                let name = f["name"].as_str()?.to_string();
                Some((
                    name,
                    serde_json::json!({
                        "type": f["type"],
                        "label": f["label"],
                        "updateable": f["updateable"],
                        "creatable": f["creatable"],
                        "required": !f["nillable"].as_bool().unwrap_or(true),
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
                derived_from: vec!["api:salesforce".to_string()],
            },
            Some(serde_json::json!({"object": object})),
        )
    }
}
