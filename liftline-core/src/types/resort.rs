//! Resort terrain feed helpers.

use std::sync::Arc;

use serde_json::Value;

/// The terrain feed scraped from a resort page.
///
/// The shape belongs to the resort's site; the engine only passes it through,
/// so it stays an opaque JSON value behind an `Arc`.
pub type ResortFeed = Arc<Value>;

/// Normalizes a resort or cache key (trimmed, lowercase).
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Number of lifts in a terrain feed (`Lifts` array), 0 if absent.
pub fn lift_count(feed: &Value) -> usize {
    feed.get("Lifts")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Vail "), "vail");
    }

    #[test]
    fn test_lift_count() {
        assert_eq!(lift_count(&json!({"Lifts": [{}, {}, {}]})), 3);
        assert_eq!(lift_count(&json!({"Trails": []})), 0);
        assert_eq!(lift_count(&json!(null)), 0);
    }
}
