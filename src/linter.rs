//! Schema linting - static analysis of schema bundles.
//!
//! Catches at rest what the walker would only hit mid-descent:
//! - dangling or malformed `$ref` pointers
//! - unknown `type` values
//! - `array`/`map` specs without `items`
//! - malformed composite-key templates, and templates naming undeclared
//!   fields
//! - reference markers on non-scalars or pointing at types absent from the
//!   bundle
//! - object-item arrays without a key template (warning: unindexable)

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{
    key_template, reference_type, spec_kind, spec_properties, template_fields, SpecKind,
    KEY_DEFINITIONS, KEY_ITEMS, KEY_KEY, KEY_PROPERTIES, KEY_REF, REF_PREFIX,
};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Record type whose schema raised the diagnostic.
    pub schema: String,
    /// Slash path to the offending spec (e.g. "/properties/attrArray/items").
    pub path: String,
    pub message: String,
}

/// Status of one linted schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a single schema in the bundle.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaResult {
    pub schema: String,
    pub status: SchemaStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of linting a whole bundle.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub schemas_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<SchemaResult>,
}

impl LintResult {
    /// Returns true if all schemas passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint every schema in a bundle.
///
/// If `strict` is true, warnings count as failures.
pub fn lint_bundle(bundle: &Value, strict: bool) -> LintResult {
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    let entries: Vec<(&String, &Value)> = bundle
        .as_object()
        .map(|map| map.iter().collect())
        .unwrap_or_default();
    let known_types: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();

    for (type_name, schema) in entries.iter().copied() {
        let result = lint_schema(type_name, schema, &known_types);
        total_errors += result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        total_warnings += result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        results.push(result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != SchemaStatus::Ok
            } else {
                r.status == SchemaStatus::Error
            }
        })
        .count();

    LintResult {
        schemas_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint one schema document.
pub fn lint_schema(type_name: &str, schema: &Value, known_types: &[&str]) -> SchemaResult {
    let mut diagnostics = Vec::new();

    let Some(root) = schema.as_object() else {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            schema: type_name.to_string(),
            path: "/".to_string(),
            message: "schema is not an object".to_string(),
        });
        return finish(type_name, diagnostics);
    };

    if !root.contains_key(KEY_PROPERTIES) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W001".to_string(),
            schema: type_name.to_string(),
            path: "/".to_string(),
            message: "schema declares no properties".to_string(),
        });
    }

    check_spec_map(root, KEY_PROPERTIES, type_name, "", schema, known_types, &mut diagnostics);
    check_spec_map(root, KEY_DEFINITIONS, type_name, "", schema, known_types, &mut diagnostics);

    finish(type_name, diagnostics)
}

fn finish(type_name: &str, diagnostics: Vec<Diagnostic>) -> SchemaResult {
    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        SchemaStatus::Error
    } else if has_warnings {
        SchemaStatus::Warning
    } else {
        SchemaStatus::Ok
    };

    SchemaResult {
        schema: type_name.to_string(),
        status,
        diagnostics,
    }
}

fn check_spec_map(
    root: &Map<String, Value>,
    section: &str,
    type_name: &str,
    path: &str,
    doc: &Value,
    known_types: &[&str],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(entries) = root.get(section).and_then(Value::as_object) else {
        return;
    };
    for (name, spec) in entries {
        let child_path = format!("{path}/{section}/{name}");
        check_spec(spec, type_name, &child_path, doc, known_types, diagnostics);
    }
}

/// Recursively check one property spec.
fn check_spec(
    spec: &Value,
    type_name: &str,
    path: &str,
    doc: &Value,
    known_types: &[&str],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let error = |code: &str, path: &str, message: String| Diagnostic {
        severity: Severity::Error,
        code: code.to_string(),
        schema: type_name.to_string(),
        path: path.to_string(),
        message,
    };

    let Some(map) = spec.as_object() else {
        diagnostics.push(error("E002", path, "property spec is not an object".into()));
        return;
    };

    if let Some(ref_val) = map.get(KEY_REF) {
        check_ref(ref_val, type_name, path, doc, diagnostics);
    }

    let kind = match spec_kind(spec) {
        Ok(kind) => kind,
        Err(e) => {
            // Pure-$ref specs carry their shape in the definition.
            if !map.contains_key(KEY_REF) {
                diagnostics.push(error("E003", path, e.to_string()));
            }
            return;
        }
    };

    if let Some(target) = reference_type(spec) {
        if !kind.is_scalar() {
            diagnostics.push(error(
                "E004",
                path,
                format!("reference marker on a non-scalar [{target}]"),
            ));
        } else if !known_types.contains(&target) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                code: "W002".to_string(),
                schema: type_name.to_string(),
                path: path.to_string(),
                message: format!("reference target type [{target}] not in bundle"),
            });
        }
    }

    match kind {
        SpecKind::Object => {
            if let Some(props) = spec_properties(spec) {
                for (name, child) in props {
                    let child_path = format!("{path}/properties/{name}");
                    check_spec(child, type_name, &child_path, doc, known_types, diagnostics);
                }
            }
            check_key_declaration(map, type_name, path, diagnostics);
        }
        SpecKind::Array | SpecKind::Map => {
            let Some(items) = map.get(KEY_ITEMS) else {
                diagnostics.push(error(
                    "E005",
                    path,
                    format!("{} spec missing items", if kind == SpecKind::Array { "array" } else { "map" }),
                ));
                return;
            };
            let items_path = format!("{path}/items");
            check_spec(items, type_name, &items_path, doc, known_types, diagnostics);

            if kind == SpecKind::Array {
                check_array_items(items, type_name, &items_path, doc, diagnostics);
            }
        }
        _ => {}
    }
}

/// Check an internal `$ref` resolves within the document.
fn check_ref(
    ref_val: &Value,
    type_name: &str,
    path: &str,
    doc: &Value,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let error = |message: String| Diagnostic {
        severity: Severity::Error,
        code: "E006".to_string(),
        schema: type_name.to_string(),
        path: path.to_string(),
        message,
    };

    let Some(ref_str) = ref_val.as_str() else {
        diagnostics.push(error("$ref is not a string".into()));
        return;
    };
    let Some(name) = ref_str.strip_prefix(REF_PREFIX) else {
        diagnostics.push(error(format!(
            "$ref [{ref_str}] must start with {REF_PREFIX}"
        )));
        return;
    };
    let resolved = doc
        .get(KEY_DEFINITIONS)
        .and_then(|defs| defs.get(name))
        .is_some();
    if !resolved {
        diagnostics.push(error(format!("dangling $ref [{ref_str}]")));
    }
}

/// Key templates on array item specs: syntax and declared-field checks;
/// object items without any template get a warning (unindexable).
fn check_array_items(
    items: &Value,
    type_name: &str,
    items_path: &str,
    doc: &Value,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Follow one level of $ref so templates on definitions are seen.
    let resolved = items
        .get(KEY_REF)
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix(REF_PREFIX))
        .and_then(|name| doc.get(KEY_DEFINITIONS).and_then(|defs| defs.get(name)))
        .unwrap_or(items);

    let Ok(kind) = spec_kind(resolved) else {
        return;
    };
    if kind != SpecKind::Object {
        return;
    }

    if key_template(resolved).is_none() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W003".to_string(),
            schema: type_name.to_string(),
            path: items_path.to_string(),
            message: "object items declare no key template; items cannot be indexed".to_string(),
        });
    }
}

fn check_key_declaration(
    map: &Map<String, Value>,
    type_name: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(template) = map.get(KEY_KEY).and_then(Value::as_str) else {
        return;
    };
    match template_fields(template) {
        Ok(fields) => {
            let props = map.get(KEY_PROPERTIES).and_then(Value::as_object);
            for field in fields {
                let declared = props.is_some_and(|p| p.contains_key(&field));
                if !declared {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        code: "W004".to_string(),
                        schema: type_name.to_string(),
                        path: path.to_string(),
                        message: format!(
                            "key template [{template}] names undeclared field [{field}]"
                        ),
                    });
                }
            }
        }
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                code: "E007".to_string(),
                schema: type_name.to_string(),
                path: path.to_string(),
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(result: &LintResult) -> Vec<&str> {
        result
            .results
            .iter()
            .flat_map(|r| r.diagnostics.iter().map(|d| d.code.as_str()))
            .collect()
    }

    #[test]
    fn clean_bundle_passes() {
        let bundle = json!({
            "schemaWitArray": {
                "name": "schemaWitArray",
                "properties": {
                    "attrArray": {
                        "type": "array",
                        "items": { "type": "object", "$ref": "#/definitions/itemObj" }
                    }
                },
                "definitions": {
                    "itemObj": {
                        "key": "{key1}_{key2}",
                        "properties": {
                            "key1": { "type": "string" },
                            "key2": { "type": "string" }
                        }
                    }
                }
            }
        });
        let result = lint_bundle(&bundle, true);
        assert!(result.is_ok(), "diagnostics: {:?}", result.results);
        assert_eq!(result.passed, 1);
        assert_eq!(result.warnings, 0);
    }

    #[test]
    fn dangling_ref_is_an_error() {
        let bundle = json!({
            "s": {
                "properties": {
                    "a": { "type": "object", "$ref": "#/definitions/missing" }
                }
            }
        });
        let result = lint_bundle(&bundle, false);
        assert!(!result.is_ok());
        assert!(codes(&result).contains(&"E006"));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let bundle = json!({
            "s": { "properties": { "a": { "type": "tuple" } } }
        });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"E003"));
    }

    #[test]
    fn array_without_items_is_an_error() {
        let bundle = json!({
            "s": { "properties": { "a": { "type": "array" } } }
        });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"E005"));
    }

    #[test]
    fn unkeyed_object_items_warn() {
        let bundle = json!({
            "s": {
                "properties": {
                    "a": {
                        "type": "array",
                        "items": { "properties": { "x": { "type": "string" } } }
                    }
                }
            }
        });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"W003"));
        assert!(result.is_ok());
        // strict mode counts the warning as a failure
        let strict = lint_bundle(&bundle, true);
        assert_eq!(strict.failed, 1);
    }

    #[test]
    fn malformed_template_is_an_error() {
        let bundle = json!({
            "s": {
                "properties": {
                    "a": {
                        "type": "array",
                        "items": {
                            "key": "{broken",
                            "properties": { "broken": { "type": "string" } }
                        }
                    }
                }
            }
        });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"E007"));
    }

    #[test]
    fn undeclared_template_field_warns() {
        let bundle = json!({
            "s": {
                "properties": {
                    "a": {
                        "type": "array",
                        "items": {
                            "key": "{key1}_{key2}",
                            "properties": { "key1": { "type": "string" } }
                        }
                    }
                }
            }
        });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"W004"));
    }

    #[test]
    fn reference_marker_checks() {
        let bundle = json!({
            "s": {
                "properties": {
                    "good": { "type": "string", "contentMediaType": "inventory/s" },
                    "stranger": { "type": "string", "contentMediaType": "inventory/other" }
                }
            }
        });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"W002"));
        assert!(!codes(&result).contains(&"E004"));
    }

    #[test]
    fn non_object_bundle_entry() {
        let bundle = json!({ "s": "not a schema" });
        let result = lint_bundle(&bundle, false);
        assert!(codes(&result).contains(&"E001"));
        assert_eq!(result.failed, 1);
    }
}
