//! Google Sheets metadata resolver (spec §4.7).

use crate::support::{get_json, require_access_token};
use crate::{MetadataRequest, MetadataResolutionResult, MetadataResolver, ResolvedMetadata};
use async_trait::async_trait;

const BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Resolves a spreadsheet's tab list, header row, and one sample row.
pub struct GoogleSheetsResolver {
    base_url: String,
}

impl Default for GoogleSheetsResolver {
    fn default() -> Self {
        Self { base_url: BASE_URL.to_string() }
    }
}

impl GoogleSheetsResolver {
    /// Build a resolver, overriding the Sheets API base URL (used in tests
    /// to point at a mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl MetadataResolver for GoogleSheetsResolver {
    async fn resolve(&self, http: &reqwest::Client, req: &MetadataRequest) -> MetadataResolutionResult {
        let base_url = &self.base_url;
        let token = match require_access_token(&req.credentials) {
            Ok(t) => t,
            Err(failure) => return failure,
        };
        let Some(spreadsheet_id) = req.param("spreadsheetId") else {
            return MetadataResolutionResult::failure("missing required param: spreadsheetId", 400);
        };

        let sheets_url = format!("{base_url}/{spreadsheet_id}?fields=sheets.properties.title");
        let sheets_doc = match get_json(http, &sheets_url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };

        let tabs: Vec<String> = sheets_doc["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| s["properties"]["title"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if tabs.is_empty() {
            return MetadataResolutionResult::failure("spreadsheet has no sheets", 502);
        }

        let tab = req
            .param("sheetName")
            .filter(|name| tabs.iter().any(|t| t == name))
            .unwrap_or(&tabs[0]);

        let headers_url = format!("{base_url}/{spreadsheet_id}/values/{tab}!1:1");
        let headers_doc = match get_json(http, &headers_url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };
        let headers: Vec<String> = headers_doc["values"][0]
            .as_array()
            .map(|row| row.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let sample_url = format!("{base_url}/{spreadsheet_id}/values/{tab}!2:2");
        let sample_doc = match get_json(http, &sample_url, token).await {
            Ok(doc) => doc,
            Err(failure) => return failure,
        };
        let sample_row: Vec<serde_json::Value> = sample_doc["values"][0].as_array().cloned().unwrap_or_default();
        let sample = serde_json::Value::Object(
            headers
                .iter()
                .cloned()
                .zip(sample_row.into_iter().chain(std::iter::repeat(serde_json::Value::Null)))
                .collect(),
        );

        MetadataResolutionResult::ok(
            ResolvedMetadata {
                columns: headers.clone(),
                headers: Some(headers),
                sample: Some(sample),
                schema: None,
                derived_from: vec!["api:google-sheets".to_string()],
            },
            Some(serde_json::json!({"tabs": tabs, "selectedTab": tab})),
        )
    }
}
