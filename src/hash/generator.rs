//! Deterministic content hashing.

use md5::Md5;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384};

use crate::hash::config::{HashAlgorithm, HashConfig};
use crate::hash::error::{HashError, HashResult};

/// Computes truncated hex digests over bytes, text and JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashGenerator {
    config: HashConfig,
}

impl HashGenerator {
    pub fn new(config: HashConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Hash raw bytes: full hex digest, truncated to the configured length.
    pub fn calculate(&self, data: &[u8]) -> String {
        let mut full = match self.config.algorithm() {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            HashAlgorithm::Sha384 => hex::encode(Sha384::digest(data)),
            HashAlgorithm::Md5 => hex::encode(Md5::digest(data)),
        };
        full.truncate(self.config.length());
        full
    }

    pub fn from_bytes(&self, data: &[u8]) -> String {
        self.calculate(data)
    }

    pub fn from_string(&self, data: &str) -> String {
        self.calculate(data.as_bytes())
    }

    /// Hash a JSON value in canonical form.
    ///
    /// Top-level keys named in `exclude_fields` are dropped first. Object key
    /// order never affects the result.
    pub fn from_json(&self, data: &Value, exclude_fields: &[&str]) -> HashResult<String> {
        let canonical = match data {
            Value::Object(map) if !exclude_fields.is_empty() => {
                let filtered: Map<String, Value> = map
                    .iter()
                    .filter(|(k, _)| !exclude_fields.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                canonical_json(&Value::Object(filtered))?
            }
            other => canonical_json(other)?,
        };
        Ok(self.from_string(&canonical))
    }

    /// Hash the value at a dotted path such as `user.profile.id`.
    pub fn from_json_field(&self, data: &Value, field_path: &str) -> HashResult<String> {
        let value = extract_field(data, field_path)
            .ok_or_else(|| HashError::FieldNotFound(field_path.to_string()))?;

        match value {
            Value::String(s) => Ok(self.from_string(s)),
            Value::Number(n) => Ok(self.from_string(&n.to_string())),
            Value::Bool(b) => Ok(self.from_string(&b.to_string())),
            Value::Object(_) => self.from_json(value, &[]),
            Value::Array(_) => Ok(self.from_string(&canonical_json(value)?)),
            Value::Null => Err(HashError::FieldNotFound(field_path.to_string())),
        }
    }
}

/// Walk a dotted path through nested objects.
///
/// Returns `None` if a segment is missing, an intermediate value is not an
/// object, or the terminal value is `null`.
pub fn extract_field<'a>(data: &'a Value, field_path: &str) -> Option<&'a Value> {
    let mut current = data;
    for part in field_path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Serialize JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> HashResult<String> {
    Ok(serde_json::to_string(&sorted(value))?)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
