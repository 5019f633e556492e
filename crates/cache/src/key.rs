//! Exact-cache key and evidence-fingerprint computation (`SPEC_FULL.md`
//! section 3 / section 4.10).

use common::tokens::Message;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct CacheKeyInput<'a> {
    model: &'a str,
    messages: &'a [Message],
    extra: &'a serde_json::Value,
    evidence_fingerprints: &'a [String],
}

/// SHA-256 hex digest of `{model, messages, extra, evidence_fingerprints}`
/// serialized with sorted map keys, so the same logical request always maps
/// to the same cache key regardless of field order.
#[must_use]
pub fn compute_cache_key(
    model: &str,
    messages: &[Message],
    extra: &serde_json::Value,
    evidence_fingerprints: &[String],
) -> String {
    let input = CacheKeyInput { model, messages, extra, evidence_fingerprints };
    let canonical = to_sorted_json(&input);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-1 hex digest of `source|text`, used to invalidate a cached answer when
/// the underlying retrieval text has changed.
#[must_use]
pub fn evidence_fingerprint(source: &str, text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(source.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serializes `value` to JSON with object keys sorted, so the output is
/// stable across field-declaration order or insertion order.
fn to_sorted_json<T: Serialize>(value: &T) -> String {
    let raw = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    let sorted = sort_value(raw);
    serde_json::to_string(&sorted).unwrap_or_default()
}

fn sort_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                if let Some(v) = map.get(&key) {
                    sorted.insert(key, sort_value(v.clone()));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_value).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use common::tokens::{Message, MessageContent};

    use super::{compute_cache_key, evidence_fingerprint};

    fn msg(role: &str, text: &str) -> Message {
        Message { role: role.to_string(), content: MessageContent::Text(text.to_string()) }
    }

    #[test]
    fn same_inputs_produce_same_key() {
        let messages = vec![msg("user", "hello")];
        let extra = serde_json::json!({"b": 1, "a": 2});
        let fingerprints = vec!["abc".to_string()];

        let a = compute_cache_key("small-fast", &messages, &extra, &fingerprints);
        let b = compute_cache_key("small-fast", &messages, &extra, &fingerprints);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_evidence_fingerprints_change_the_key() {
        let messages = vec![msg("user", "hello")];
        let extra = serde_json::json!({});
        let a = compute_cache_key("small-fast", &messages, &extra, &["abc".to_string()]);
        let b = compute_cache_key("small-fast", &messages, &extra, &["def".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_depends_on_source_and_text() {
        let a = evidence_fingerprint("a.rs:1", "fn main() {}");
        let b = evidence_fingerprint("a.rs:1", "fn other() {}");
        assert_ne!(a, b);
        assert_eq!(a.len(), 40);
    }
}
