//! Deterministic spec hashing.
//!
//! Synthesized child resources carry a hash of the parent spec that
//! produced them. Because synthesis is deterministic, an
//! existence-only lookup plus a hash label is enough to answer "is the
//! child I want already there" without diffing child contents.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A spec hash for deterministic comparison.
///
/// Rendered as `sha256:<hex>`, truncated to 128 bits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecHash(String);

impl SpecHash {
    /// Hash of a serializable spec value.
    ///
    /// Object key order never affects the result, so two specs hash
    /// equal exactly when they are structurally equal.
    pub fn of<T: Serialize>(spec: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::from_json(&serde_json::to_value(spec)?))
    }

    /// Hash of an already-built JSON value.
    pub fn from_json(value: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(value, &mut canonical);

        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("sha256:{}", hex::encode(&digest[..16])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpecHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append `value` as canonical JSON: object keys sorted, no
/// whitespace. Leaves go through serde_json's compact serializer, so
/// string escaping and number formatting match ordinary output.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(key, _)| key.as_str());

            out.push('{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(child, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_hash_ignores_key_order() {
        let json1 = serde_json::json!({"b": 2, "a": 1});
        let json2 = serde_json::json!({"a": 1, "b": 2});

        assert_eq!(SpecHash::from_json(&json1), SpecHash::from_json(&json2));
    }

    #[test]
    fn test_spec_hash_detects_value_change() {
        let json1 = serde_json::json!({"schedule": "2099-01-01T00:00:00Z"});
        let json2 = serde_json::json!({"schedule": "2099-01-01T00:00:01Z"});

        assert_ne!(SpecHash::from_json(&json1), SpecHash::from_json(&json2));
    }

    #[test]
    fn test_typed_spec_matches_equivalent_json() {
        #[derive(Serialize)]
        struct Spec {
            schedule: String,
            command: String,
        }

        let spec = Spec {
            schedule: "2099-01-01T00:00:00Z".to_string(),
            command: "echo hi".to_string(),
        };
        let json = serde_json::json!({
            "command": "echo hi",
            "schedule": "2099-01-01T00:00:00Z",
        });

        assert_eq!(SpecHash::of(&spec).unwrap(), SpecHash::from_json(&json));
    }

    #[test]
    fn test_strings_needing_escapes_hash_distinctly() {
        // Escaping goes through serde_json; a quote and its escaped
        // spelling must not collide.
        let json1 = serde_json::json!({"command": "echo \"hi\""});
        let json2 = serde_json::json!({"command": "echo \\\"hi\\\""});
        let json3 = serde_json::json!({"command": "echo\nhi"});

        let hashes = [
            SpecHash::from_json(&json1),
            SpecHash::from_json(&json2),
            SpecHash::from_json(&json3),
        ];
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[0], hashes[2]);
        assert_ne!(hashes[1], hashes[2]);
    }

    #[test]
    fn test_spec_hash_has_stable_prefix() {
        let hash = SpecHash::from_json(&serde_json::json!({}));
        assert!(hash.as_str().starts_with("sha256:"));
        assert_eq!(hash.as_str().len(), "sha256:".len() + 32);
    }
}
