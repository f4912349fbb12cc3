//! Helpers for working with raw JSON payloads.
//!
//! Payloads are the flat object form of an artifact, as handed in by callers,
//! returned by the generation service, or loaded from the store.

use serde_json::{Map, Value};

use crate::domain::{ArtifactId, ArtifactType};
use crate::error::{ArtifactError, Result};

/// Read the `type` tag of a payload
pub fn payload_type(payload: &Value) -> Result<ArtifactType> {
    let tag = payload
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ArtifactError::invalid_payload("payload has no 'type' field"))?;

    tag.parse()
}

/// Read the `id` of a payload, if it carries one
pub fn payload_id(payload: &Value) -> Result<Option<ArtifactId>> {
    match payload.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some),
        Some(other) => Err(ArtifactError::invalid_payload(format!(
            "'id' must be a string, got {}",
            other
        ))),
    }
}

/// Borrow the payload as an object, rejecting anything else
pub fn as_object_mut(payload: &mut Value) -> Result<&mut Map<String, Value>> {
    payload
        .as_object_mut()
        .ok_or_else(|| ArtifactError::invalid_payload("payload must be a JSON object"))
}

/// Copy every field of `overlay` onto `base`.
///
/// Objects present on both sides are merged recursively so a partial
/// `metadata` object keeps the fields it does not mention. Everything else,
/// arrays included, is replaced.
pub fn merge_into(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_object()
                    && base_map.get(key).map(Value::is_object).unwrap_or(false);

                if nested {
                    if let Some(existing) = base_map.get_mut(key) {
                        merge_into(existing, value);
                    }
                } else {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Set `metadata.<field>`, creating the metadata object if needed
pub fn set_metadata_field(payload: &mut Value, field: &str, value: Value) -> Result<()> {
    let object = as_object_mut(payload)?;
    let metadata = object
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));

    if !metadata.is_object() {
        *metadata = Value::Object(Map::new());
    }
    if let Some(map) = metadata.as_object_mut() {
        map.insert(field.to_string(), value);
    }
    Ok(())
}

/// Non-empty string field, trimmed
pub fn str_field<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_type() {
        assert_eq!(
            payload_type(&json!({ "type": "diagram" })).unwrap(),
            ArtifactType::Diagram
        );
        assert!(matches!(
            payload_type(&json!({})),
            Err(ArtifactError::InvalidPayload { .. })
        ));
        assert!(matches!(
            payload_type(&json!({ "type": "hologram" })),
            Err(ArtifactError::ConstructorNotFound { .. })
        ));
    }

    #[test]
    fn test_merge_is_recursive_for_objects_only() {
        let mut base = json!({
            "title": "old",
            "metadata": { "created_at": "2024-01-01T00:00:00Z", "revision": 1 },
            "rows": [["a"], ["b"]]
        });
        let overlay = json!({
            "title": "new",
            "metadata": { "revision": 2 },
            "rows": [["c"]]
        });

        merge_into(&mut base, &overlay);

        assert_eq!(base["title"], "new");
        assert_eq!(base["metadata"]["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(base["metadata"]["revision"], 2);
        assert_eq!(base["rows"], json!([["c"]]));
    }

    #[test]
    fn test_set_metadata_field_creates_object() {
        let mut payload = json!({ "type": "code" });
        set_metadata_field(&mut payload, "last_updated", json!("now")).unwrap();
        assert_eq!(payload["metadata"]["last_updated"], "now");

        let mut not_object = json!([1, 2]);
        assert!(set_metadata_field(&mut not_object, "x", json!(1)).is_err());
    }

    #[test]
    fn test_payload_id() {
        let id = ArtifactId::new();
        assert_eq!(payload_id(&json!({ "id": id.to_string() })).unwrap(), Some(id));
        assert_eq!(payload_id(&json!({})).unwrap(), None);
        assert!(payload_id(&json!({ "id": 7 })).is_err());
        assert!(payload_id(&json!({ "id": "not-a-uuid" })).is_err());
    }
}
