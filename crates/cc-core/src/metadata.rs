//! Generic table-like schema descriptor returned by metadata resolution
//! (spec §3 `WorkflowNodeMetadata`, §4.7).

use serde::{Deserialize, Serialize};

/// Normalized result of introspecting a vendor resource (a sheet tab, a
/// Salesforce object, a HubSpot property group, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowNodeMetadata {
    /// Column / field identifiers, in vendor order.
    pub columns: Vec<String>,
    /// Display headers, usually equal to `columns` but kept distinct for
    /// vendors where the two differ (e.g. API name vs. label).
    pub headers: Vec<String>,
    /// One representative sample row, keyed by header.
    pub sample: serde_json::Value,
    /// Optional per-column type/label schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Provenance tags, e.g. `["api:google-sheets"]`.
    pub derived_from: Vec<String>,
}

impl WorkflowNodeMetadata {
    /// Build metadata with no schema and no sample.
    pub fn new(columns: Vec<String>, derived_from: impl Into<String>) -> Self {
        Self {
            headers: columns.clone(),
            columns,
            sample: serde_json::Value::Null,
            schema: None,
            derived_from: vec![derived_from.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_headers_to_columns() {
        let meta = WorkflowNodeMetadata::new(
            vec!["Email".into(), "Name".into()],
            "api:google-sheets",
        );
        assert_eq!(meta.headers, meta.columns);
        assert_eq!(meta.derived_from, vec!["api:google-sheets".to_string()]);
    }
}
