//! The record envelope: a typed, versioned document with a JSON data payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WalkError;

/// Reserved envelope attribute for the record id.
pub const KEY_RECORD_ID: &str = "__id";
/// Reserved envelope attribute for the record type.
pub const KEY_RECORD_TYPE: &str = "__type";
/// Reserved envelope attribute for the record version.
pub const KEY_RECORD_VER: &str = "__ver";
/// Reserved envelope attribute for the data payload.
pub const KEY_RECORD_DATA: &str = "data";

/// A stored document identified by `(type, id)`.
///
/// The `data` payload is any JSON object; it is expected (but not enforced
/// here) to conform to the schema registered under `record_type`. The
/// version string is an opaque semver triple the walker never interprets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "__id")]
    pub id: String,
    #[serde(rename = "__type")]
    pub record_type: String,
    #[serde(rename = "__ver")]
    pub version: String,
    pub data: Value,
}

impl Record {
    /// Build a record from its parts.
    pub fn new(
        record_type: impl Into<String>,
        version: impl Into<String>,
        id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            version: version.into(),
            data,
        }
    }

    /// Deserialize a record from a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::InvalidRecord` when the envelope attributes are
    /// missing or malformed, when the id is empty, or when `data` is not an
    /// object.
    pub fn from_value(value: Value) -> Result<Self, WalkError> {
        let record: Record =
            serde_json::from_value(value).map_err(|e| WalkError::InvalidRecord {
                message: format!("cannot decode record envelope: {e}"),
            })?;
        if record.id.is_empty() {
            return Err(WalkError::InvalidRecord {
                message: format!("record of type [{}] has an empty {KEY_RECORD_ID}", record.record_type),
            });
        }
        if !record.data.is_object() {
            return Err(WalkError::InvalidRecord {
                message: format!(
                    "record [{}/{}] {KEY_RECORD_DATA} is not an object",
                    record.record_type, record.id
                ),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_valid() {
        let record = Record::from_value(json!({
            "__id": "data1",
            "__type": "schema1",
            "__ver": "0.0.1",
            "data": { "name": "data1" }
        }))
        .unwrap();
        assert_eq!(record.id, "data1");
        assert_eq!(record.record_type, "schema1");
        assert_eq!(record.version, "0.0.1");
        assert_eq!(record.data["name"], "data1");
    }

    #[test]
    fn from_value_missing_envelope_attr() {
        let result = Record::from_value(json!({
            "__id": "data1",
            "data": {}
        }));
        assert!(matches!(result, Err(WalkError::InvalidRecord { .. })));
    }

    #[test]
    fn from_value_empty_id() {
        let result = Record::from_value(json!({
            "__id": "",
            "__type": "schema1",
            "__ver": "0.0.1",
            "data": {}
        }));
        assert!(matches!(result, Err(WalkError::InvalidRecord { .. })));
    }

    #[test]
    fn from_value_non_object_data() {
        let result = Record::from_value(json!({
            "__id": "data1",
            "__type": "schema1",
            "__ver": "0.0.1",
            "data": "scalar"
        }));
        assert!(matches!(result, Err(WalkError::InvalidRecord { .. })));
    }

    #[test]
    fn round_trips_reserved_names() {
        let record = Record::new("schema1", "0.0.1", "data1", json!({"a": 1}));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["__id"], "data1");
        assert_eq!(value["__type"], "schema1");
        assert_eq!(value["__ver"], "0.0.1");
        assert_eq!(value["data"]["a"], 1);
    }
}
