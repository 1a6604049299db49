//! Deterministic cache keys for SWR calls.
//!
//! A key is `<namespace>:<method>:<canonical payload JSON>`. Canonical JSON
//! sorts object keys recursively and keeps array order, so two payloads with
//! the same content in a different field order share one entry. The
//! conditional-fetch field is excluded from the key.

use evkit_core::IF_NONE_MATCH;
use serde_json::{Map, Value};

/// A cache key derived from a method and its payload.
///
/// Can only be built through [`CacheKey::derive`], so every key in the
/// store has passed through canonicalisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    encoded: String,
}

impl CacheKey {
    /// Derive the key for `method` called with `payload`.
    pub fn derive(namespace: &str, method: &str, payload: &Value) -> Self {
        let stripped = match payload {
            Value::Object(map) if map.contains_key(IF_NONE_MATCH) => {
                let mut map = map.clone();
                map.remove(IF_NONE_MATCH);
                Value::Object(map)
            }
            other => other.clone(),
        };
        Self {
            encoded: format!("{}:{}:{}", namespace, method, canonical_json(&stripped)),
        }
    }

    /// Prefix shared by every key of `namespace`.
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{}:", namespace)
    }

    /// Prefix shared by every key of `method` within `namespace`.
    pub fn method_prefix(namespace: &str, method: &str) -> String {
        format!("{}:{}:", namespace, method)
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Serialize `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_does_not_matter() {
        let a = CacheKey::derive("ns", "events/list", &json!({"brandId": "abc", "limit": 10}));
        let b = CacheKey::derive("ns", "events/list", &json!({"limit": 10, "brandId": "abc"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let a = canonical_json(&json!({"z": {"b": 1, "a": [{"d": 1, "c": 2}]}, "y": null}));
        assert_eq!(a, r#"{"y":null,"z":{"a":[{"c":2,"d":1}],"b":1}}"#);
    }

    #[test]
    fn test_array_order_matters() {
        let a = CacheKey::derive("ns", "m", &json!({"ids": [1, 2]}));
        let b = CacheKey::derive("ns", "m", &json!({"ids": [2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_if_none_match_excluded() {
        let plain = CacheKey::derive("ns", "m", &json!({"id": "e1"}));
        let conditional = CacheKey::derive("ns", "m", &json!({"id": "e1", "ifNoneMatch": "W/1"}));
        assert_eq!(plain, conditional);
    }

    #[test]
    fn test_method_and_namespace_distinguish() {
        let payload = json!({});
        let a = CacheKey::derive("ns", "events/list", &payload);
        let b = CacheKey::derive("ns", "events/get", &payload);
        let c = CacheKey::derive("other", "events/list", &payload);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "ns:events/list:{}");
        assert!(a.as_str().starts_with(&CacheKey::method_prefix("ns", "events/list")));
        assert!(a.as_str().starts_with(&CacheKey::namespace_prefix("ns")));
    }
}
