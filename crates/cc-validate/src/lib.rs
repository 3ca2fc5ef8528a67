//! Payload validator (spec §4.6, C7): compiled JSON-schema validators,
//! cached by schema identity.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cc_error::ConnectorError;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Cache of compiled validators, keyed by the schema's content hash.
///
/// Spec §5 describes a "weak/identity-keyed map keyed by the schema
/// object". Rust has no convenient weak-identity map over arbitrary JSON
/// values, so identity is approximated by a SHA-256 hash of the schema's
/// canonical JSON representation (`serde_json::Value`'s default map is
/// already key-sorted, giving a stable serialization) — see DESIGN.md.
#[derive(Default)]
pub struct SchemaValidatorCache {
    compiled: Mutex<HashMap<String, Arc<jsonschema::Validator>>>,
}

impl SchemaValidatorCache {
    /// Build an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_compile(&self, schema: &serde_json::Value) -> Result<Arc<jsonschema::Validator>, ConnectorError> {
        let key = schema_key(schema);
        let mut compiled = self.compiled.lock().expect("schema cache lock poisoned");
        if let Some(validator) = compiled.get(&key) {
            return Ok(validator.clone());
        }

        debug!(target: "cc.validate", schema_key = %key, "compiling schema");
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| ConnectorError::validation(format!("invalid JSON schema: {e}")))?;
        let validator = Arc::new(validator);
        compiled.insert(key, validator.clone());
        Ok(validator)
    }

    /// Validate `payload` against `schema`, returning a concatenated error
    /// report (one `{instancePath}: {message}` entry per violation) on
    /// failure, and the payload deserialized as `T` on success.
    pub fn validate<T: DeserializeOwned>(
        &self,
        schema: &serde_json::Value,
        payload: serde_json::Value,
    ) -> Result<T, ConnectorError> {
        let validator = self.get_or_compile(schema)?;

        let errors: Vec<String> = validator
            .iter_errors(&payload)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();

        if !errors.is_empty() {
            return Err(ConnectorError::validation(errors.join("; ")));
        }

        serde_json::from_value(payload)
            .map_err(|e| ConnectorError::validation(format!("payload did not match expected shape: {e}")))
    }
}

fn schema_key(schema: &serde_json::Value) -> String {
    let canonical = schema.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
