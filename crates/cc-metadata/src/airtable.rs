//! Airtable metadata resolver (spec §4.7).

use crate::support::{get_json, require_access_token};
use crate::{MetadataRequest, MetadataResolutionResult, MetadataResolver, ResolvedMetadata};
use async_trait::async_trait;

const BASE_URL: &str = "https://api.airtable.com/v0/meta/bases";

/// Resolves a base's table list and the selected table's field list.
pub struct AirtableResolver;

#[async_trait]
impl MetadataResolver for AirtableResolver {
    async fn resolve(&self, http: &reqwest::Client, req: &MetadataRequest) -> MetadataResolutionResult {
        let token = match require_access_token(&req.credentials) {
            Ok(t) => t,
            Err(failure) => return failure,
        };
        let Some(base_id) = req.param("baseId") else {
            return MetadataResolutionResult::failure("missing required param: baseId", 400);
        };

        let url = format!("{BASE_URL}/{base_id}/tables");
        let doc = match get_json(http, &url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };

        let tables = doc["tables"].as_array().cloned().unwrap_or_default();
        if tables.is_empty() {
            return MetadataResolutionResult::failure("base has no tables", 502);
        }

        let requested_name = req.param("tableName");
        let requested_id = req.param("tableId");
        let table = tables
            .iter()
            .find(|t| {
                requested_id.is_some_and(|id| t["id"].as_str() == Some(id))
                    || requested_name.is_some_and(|name| t["name"].as_str() == Some(name))
            })
            .unwrap_or(&tables[0]);

        let fields = table["fields"].as_array().cloned().unwrap_or_default();
        let columns: Vec<String> = fields.iter().filter_map(|f| f["name"].as_str().map(str::to_string)).collect();

        let schema: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .filter_map(|f| {
                let name = f["name"].as_str()?.to_string();
                Some((
                    name,
                    serde_json::json!({
                        "type": f["type"],
                        "description": f["description"],
                        "options": f["options"],
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
                derived_from: vec!["api:airtable".to_string()],
            },
            Some(serde_json::json!({
                "tables": tables.iter().filter_map(|t| t["name"].as_str()).collect::<Vec<_>>(),
                "selectedTable": table["name"],
            })),
        )
    }
}
