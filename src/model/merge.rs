use serde_json::Value;

use crate::types::{Document, UID_FIELD};

/// Keys that identify a stored record. Clients can never write them.
pub const IDENTITY_FIELDS: [&str; 4] = ["_id", "_rev", "__v", UID_FIELD];

/// Drops identity keys from client input. Returns how many were removed.
pub fn strip_identity_fields(doc: &mut Document) -> usize {
    IDENTITY_FIELDS
        .iter()
        .filter(|key| doc.remove(**key).is_some())
        .count()
}

/// Overlays `patch` onto `target`.
///
/// Objects merge key by key, recursively. Any other patch value, arrays and
/// `null` included, replaces the target value. Keys absent from the patch are
/// left alone.
pub fn deep_merge(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        match value {
            Value::Object(incoming) => {
                if let Some(Value::Object(existing)) = target.get_mut(&key) {
                    deep_merge(existing, incoming);
                } else {
                    target.insert(key, Value::Object(incoming));
                }
            }
            value => {
                target.insert(key, value);
            }
        }
    }
}
