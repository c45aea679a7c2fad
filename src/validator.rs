//! Record validation against schema documents.
//!
//! The walker assumes records conform to their schema; this module checks
//! it. The dialect is converted to a standard JSON Schema (see
//! [`SchemaDoc::to_json_schema`]) and the record's data payload is run
//! through a draft validator.

use serde_json::Value;

use crate::error::{ValidateError, ValidationError, WalkError};
use crate::record::Record;
use crate::schema::SchemaDoc;

/// Validate a record's data payload against its schema document.
///
/// # Errors
///
/// Returns `ValidateError::Walk` when the schema cannot be compiled, or
/// `ValidateError::Invalid` listing every divergence found.
pub fn validate_record(doc: &SchemaDoc, record: &Record) -> Result<(), ValidateError> {
    validate_against_schema(&doc.to_json_schema(), &record.data)
}

/// Validate a payload against an already-converted JSON Schema.
///
/// Use this when one schema checks many payloads.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        ValidateError::Walk(WalkError::BadSchema {
            path: String::new(),
            message: e.to_string(),
        })
    })?;

    let errors: Vec<ValidationError> = validator
        .iter_errors(payload)
        .map(|e| ValidationError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
