//! Schema documents - the dialect the walker descends.
//!
//! A schema document is a JSON-Schema-like mapping with `properties`,
//! `definitions`, local `$ref` pointers of the form `#/definitions/<name>`,
//! a `map` type for open keyed collections, `key` composite-key templates
//! on array item specs, and `contentMediaType: inventory/<T>` reference
//! markers on scalars.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::WalkError;

/// Schema keyword: node type.
pub const KEY_TYPE: &str = "type";
/// Schema keyword: object properties.
pub const KEY_PROPERTIES: &str = "properties";
/// Schema keyword: array/map item spec.
pub const KEY_ITEMS: &str = "items";
/// Schema keyword: local definitions.
pub const KEY_DEFINITIONS: &str = "definitions";
/// Schema keyword: local reference.
pub const KEY_REF: &str = "$ref";
/// Schema keyword: composite-key template on array item specs.
pub const KEY_KEY: &str = "key";
/// Schema keyword: informational name.
pub const KEY_NAME: &str = "name";
/// Schema keyword: scalar content marker.
pub const KEY_CONTENT_MEDIA_TYPE: &str = "contentMediaType";

/// Required prefix of local `$ref` strings.
pub const REF_PREFIX: &str = "#/definitions/";
/// `contentMediaType` prefix declaring a cross-record reference.
pub const INVENTORY_PREFIX: &str = "inventory/";

/// The discriminant of a property spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Map,
}

impl SpecKind {
    /// True for the four scalar leaf kinds.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            SpecKind::String | SpecKind::Integer | SpecKind::Number | SpecKind::Boolean
        )
    }
}

/// Classify a property spec by its `type` keyword.
///
/// Definition bodies may omit `type`; a spec carrying `properties` is an
/// object spec. Anything else without a `type` is malformed.
///
/// # Errors
///
/// Returns `WalkError::BadSchema` on an unknown or missing type.
pub fn spec_kind(spec: &Value) -> Result<SpecKind, WalkError> {
    let bad = |message: String| WalkError::BadSchema {
        path: String::new(),
        message,
    };

    match spec.get(KEY_TYPE) {
        Some(Value::String(s)) => match s.as_str() {
            "string" => Ok(SpecKind::String),
            "integer" => Ok(SpecKind::Integer),
            "number" => Ok(SpecKind::Number),
            "boolean" => Ok(SpecKind::Boolean),
            "object" => Ok(SpecKind::Object),
            "array" => Ok(SpecKind::Array),
            "map" => Ok(SpecKind::Map),
            other => Err(bad(format!("unknown spec type [{other}]"))),
        },
        Some(other) => Err(bad(format!(
            "spec type must be a string, got {}",
            json_type_name(other)
        ))),
        None if spec.get(KEY_PROPERTIES).is_some() => Ok(SpecKind::Object),
        None => Err(bad("spec has neither type nor properties".into())),
    }
}

/// The `properties` mapping of an object spec, if present.
pub fn spec_properties(spec: &Value) -> Option<&Map<String, Value>> {
    spec.get(KEY_PROPERTIES).and_then(Value::as_object)
}

/// The record type a scalar spec references, if it carries the
/// `contentMediaType: inventory/<T>` marker.
pub fn reference_type(spec: &Value) -> Option<&str> {
    spec.get(KEY_CONTENT_MEDIA_TYPE)
        .and_then(Value::as_str)
        .and_then(|cmt| cmt.strip_prefix(INVENTORY_PREFIX))
}

/// The composite-key template declared on an (item) spec.
pub fn key_template(spec: &Value) -> Option<&str> {
    spec.get(KEY_KEY).and_then(Value::as_str)
}

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalized schema for one record type.
///
/// Immutable after construction. The document itself doubles as the root
/// object spec: the walker starts descent at [`SchemaDoc::root`].
#[derive(Debug, Clone)]
pub struct SchemaDoc {
    id: String,
    raw: Value,
}

impl SchemaDoc {
    /// Wrap a decoded schema mapping under its type name.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::BadSchema` when the decoded value is not an
    /// object.
    pub fn new(raw: Value, type_name: &str) -> Result<Self, WalkError> {
        if !raw.is_object() {
            return Err(WalkError::BadSchema {
                path: String::new(),
                message: format!(
                    "schema [{type_name}] must be an object, got {}",
                    json_type_name(&raw)
                ),
            });
        }
        Ok(Self {
            id: type_name.to_string(),
            raw,
        })
    }

    /// The type name this document governs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Informational schema name.
    pub fn name(&self) -> Option<&str> {
        self.raw.get(KEY_NAME).and_then(Value::as_str)
    }

    /// The whole document, usable as the root object spec.
    pub fn root(&self) -> &Value {
        &self.raw
    }

    /// The `definitions` mapping, if present.
    pub fn definitions(&self) -> Option<&Map<String, Value>> {
        self.raw.get(KEY_DEFINITIONS).and_then(Value::as_object)
    }

    /// Lookup an attribute spec in the root `properties`.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::UnknownAttribute` when the attribute is not
    /// declared.
    pub fn property_of(&self, name: &str) -> Result<&Value, WalkError> {
        spec_properties(self.root())
            .and_then(|props| props.get(name))
            .ok_or_else(|| WalkError::UnknownAttribute {
                path: String::new(),
                attribute: name.to_string(),
            })
    }

    /// Resolve a spec's local `$ref`, if any.
    ///
    /// Non-ref specs are returned unchanged. Resolution is a single
    /// substitution within this document; it never recurses and carries no
    /// cycle state (cross-record recursion is bounded separately, in the
    /// walker).
    ///
    /// # Errors
    ///
    /// Returns `WalkError::BadSchema` on a malformed or dangling ref.
    pub fn resolve_ref<'a>(&'a self, spec: &'a Value) -> Result<&'a Value, WalkError> {
        let Some(ref_val) = spec.get(KEY_REF) else {
            return Ok(spec);
        };
        let bad = |message: String| WalkError::BadSchema {
            path: String::new(),
            message,
        };
        let ref_str = ref_val
            .as_str()
            .ok_or_else(|| bad(format!("$ref must be a string, got {}", json_type_name(ref_val))))?;
        let name = ref_str
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| bad(format!("$ref [{ref_str}] must start with {REF_PREFIX}")))?;
        self.definitions()
            .and_then(|defs| defs.get(name))
            .ok_or_else(|| bad(format!("dangling $ref [{ref_str}] in schema [{}]", self.id)))
    }

    /// Convert the dialect to a standard JSON Schema for validation.
    ///
    /// The only non-standard construct a validator chokes on is the `map`
    /// type; it becomes `object` with `additionalProperties` set to the
    /// converted item spec. `key` and `contentMediaType` survive as
    /// annotations.
    pub fn to_json_schema(&self) -> Value {
        let mut out = convert_spec(&self.raw);
        if let Value::Object(map) = &mut out {
            map.entry(KEY_TYPE).or_insert(Value::String("object".into()));
        }
        out
    }
}

fn convert_spec(spec: &Value) -> Value {
    let Value::Object(map) = spec else {
        return spec.clone();
    };

    let is_map_spec = map.get(KEY_TYPE).and_then(Value::as_str) == Some("map");

    let mut out = Map::new();
    for (k, v) in map {
        match k.as_str() {
            KEY_TYPE if is_map_spec => {
                out.insert(KEY_TYPE.into(), Value::String("object".into()));
            }
            KEY_ITEMS if is_map_spec => {
                out.insert("additionalProperties".into(), convert_spec(v));
            }
            KEY_ITEMS => {
                out.insert(k.clone(), convert_spec(v));
            }
            KEY_PROPERTIES | KEY_DEFINITIONS => {
                let converted = v.as_object().map_or_else(
                    || v.clone(),
                    |entries| {
                        Value::Object(
                            entries
                                .iter()
                                .map(|(name, child)| (name.clone(), convert_spec(child)))
                                .collect(),
                        )
                    },
                );
                out.insert(k.clone(), converted);
            }
            _ => {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    Value::Object(out)
}

/// Errors while rendering a composite-key template against an item.
#[derive(Debug, Error)]
pub enum KeyRenderError {
    #[error("malformed key template [{0}]")]
    Malformed(String),

    #[error("key field [{0}] missing from item")]
    MissingField(String),

    #[error("key field [{0}] is not renderable as a string")]
    Unrenderable(String),
}

/// Extract the field names of a composite-key template.
///
/// # Errors
///
/// Returns [`KeyRenderError::Malformed`] on unbalanced or empty braces.
pub fn template_fields(template: &str) -> Result<Vec<String>, KeyRenderError> {
    let malformed = || KeyRenderError::Malformed(template.to_string());

    let mut fields = Vec::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(malformed()),
                        Some(c) => field.push(c),
                    }
                }
                if field.is_empty() {
                    return Err(malformed());
                }
                fields.push(field);
            }
            '}' => return Err(malformed()),
            _ => {}
        }
    }
    Ok(fields)
}

/// Render a composite-key template like `{key1}_{key2}` against an item.
///
/// Each `{field}` placeholder is substituted with the item's field value:
/// strings verbatim, numbers and booleans via their JSON display form.
///
/// # Errors
///
/// Returns [`KeyRenderError`] on unbalanced or empty braces, missing
/// fields, or fields that are not scalars.
pub fn render_key(template: &str, item: &Value) -> Result<String, KeyRenderError> {
    let malformed = || KeyRenderError::Malformed(template.to_string());

    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(malformed()),
                        Some(c) => field.push(c),
                    }
                }
                if field.is_empty() {
                    return Err(malformed());
                }
                match item.get(&field) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Number(n)) => out.push_str(&n.to_string()),
                    Some(Value::Bool(b)) => out.push_str(&b.to_string()),
                    Some(Value::Null) | None => {
                        return Err(KeyRenderError::MissingField(field));
                    }
                    Some(_) => return Err(KeyRenderError::Unrenderable(field)),
                }
            }
            '}' => return Err(malformed()),
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc() -> SchemaDoc {
        SchemaDoc::new(
            json!({
                "name": "schema1",
                "description": "test schema",
                "properties": {
                    "name": { "type": "string" },
                    "value": { "type": "object", "$ref": "#/definitions/testValue" },
                    "mapStr": { "type": "map", "items": { "type": "string" } }
                },
                "definitions": {
                    "testValue": {
                        "properties": {
                            "value1": { "type": "string" },
                            "value2": { "type": "string" }
                        }
                    }
                }
            }),
            "schema1",
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_non_object() {
        let result = SchemaDoc::new(json!("scalar"), "bad");
        assert!(matches!(result, Err(WalkError::BadSchema { .. })));
    }

    #[test]
    fn doc_accessors() {
        let doc = sample_doc();
        assert_eq!(doc.id(), "schema1");
        assert_eq!(doc.name(), Some("schema1"));
        assert!(doc.definitions().unwrap().contains_key("testValue"));
    }

    #[test]
    fn property_of_known_and_unknown() {
        let doc = sample_doc();
        assert_eq!(doc.property_of("name").unwrap()[KEY_TYPE], "string");
        assert!(matches!(
            doc.property_of("missing"),
            Err(WalkError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn resolve_ref_follows_definition() {
        let doc = sample_doc();
        let spec = doc.property_of("value").unwrap();
        let resolved = doc.resolve_ref(spec).unwrap();
        assert!(spec_properties(resolved).unwrap().contains_key("value1"));
    }

    #[test]
    fn resolve_ref_passes_non_refs_through() {
        let doc = sample_doc();
        let spec = doc.property_of("name").unwrap();
        let resolved = doc.resolve_ref(spec).unwrap();
        assert_eq!(resolved, spec);
    }

    #[test]
    fn resolve_ref_dangling_fails() {
        let doc = SchemaDoc::new(
            json!({
                "properties": {
                    "value": { "type": "object", "$ref": "#/definitions/missing" }
                }
            }),
            "schema1",
        )
        .unwrap();
        let spec = doc.property_of("value").unwrap();
        assert!(matches!(
            doc.resolve_ref(spec),
            Err(WalkError::BadSchema { .. })
        ));
    }

    #[test]
    fn resolve_ref_foreign_form_fails() {
        let doc = sample_doc();
        let spec = json!({ "$ref": "#/$defs/other" });
        assert!(matches!(
            doc.resolve_ref(&spec),
            Err(WalkError::BadSchema { .. })
        ));
    }

    #[test]
    fn spec_kind_classification() {
        assert_eq!(spec_kind(&json!({"type": "string"})).unwrap(), SpecKind::String);
        assert_eq!(spec_kind(&json!({"type": "map", "items": {}})).unwrap(), SpecKind::Map);
        assert_eq!(spec_kind(&json!({"type": "array", "items": {}})).unwrap(), SpecKind::Array);
        // Definition body without an explicit type
        assert_eq!(
            spec_kind(&json!({"properties": {"a": {"type": "string"}}})).unwrap(),
            SpecKind::Object
        );
        assert!(spec_kind(&json!({"type": "string"})).unwrap().is_scalar());
        assert!(!spec_kind(&json!({"type": "array", "items": {}})).unwrap().is_scalar());
    }

    #[test]
    fn spec_kind_unknown_type_fails() {
        assert!(matches!(
            spec_kind(&json!({"type": "tuple"})),
            Err(WalkError::BadSchema { .. })
        ));
        assert!(matches!(
            spec_kind(&json!({"description": "nothing else"})),
            Err(WalkError::BadSchema { .. })
        ));
    }

    #[test]
    fn reference_type_extraction() {
        let spec = json!({ "type": "string", "contentMediaType": "inventory/schemaRef" });
        assert_eq!(reference_type(&spec), Some("schemaRef"));

        let spec = json!({ "type": "string", "contentMediaType": "text/plain" });
        assert_eq!(reference_type(&spec), None);

        let spec = json!({ "type": "string" });
        assert_eq!(reference_type(&spec), None);
    }

    #[test]
    fn render_key_basic() {
        let item = json!({ "key1": "01", "key2": "02" });
        assert_eq!(render_key("{key1}_{key2}", &item).unwrap(), "01_02");
    }

    #[test]
    fn render_key_literal_text_and_numbers() {
        let item = json!({ "host": "db1", "port": 8080 });
        assert_eq!(render_key("{host}:{port}", &item).unwrap(), "db1:8080");
    }

    #[test]
    fn render_key_missing_field() {
        let item = json!({ "key1": "01" });
        assert!(matches!(
            render_key("{key1}_{key2}", &item),
            Err(KeyRenderError::MissingField(f)) if f == "key2"
        ));
    }

    #[test]
    fn render_key_malformed_templates() {
        let item = json!({ "a": "1" });
        assert!(matches!(render_key("{a", &item), Err(KeyRenderError::Malformed(_))));
        assert!(matches!(render_key("a}", &item), Err(KeyRenderError::Malformed(_))));
        assert!(matches!(render_key("{}", &item), Err(KeyRenderError::Malformed(_))));
        assert!(matches!(render_key("{{a}}", &item), Err(KeyRenderError::Malformed(_))));
    }

    #[test]
    fn template_fields_extraction() {
        assert_eq!(template_fields("{key1}_{key2}").unwrap(), vec!["key1", "key2"]);
        assert_eq!(template_fields("plain").unwrap(), Vec::<String>::new());
        assert!(matches!(
            template_fields("{open"),
            Err(KeyRenderError::Malformed(_))
        ));
    }

    #[test]
    fn render_key_unrenderable_field() {
        let item = json!({ "a": {"nested": true} });
        assert!(matches!(
            render_key("{a}", &item),
            Err(KeyRenderError::Unrenderable(_))
        ));
    }

    #[test]
    fn to_json_schema_converts_maps() {
        let doc = sample_doc();
        let converted = doc.to_json_schema();
        assert_eq!(converted["type"], "object");
        assert_eq!(converted["properties"]["mapStr"]["type"], "object");
        assert_eq!(
            converted["properties"]["mapStr"]["additionalProperties"]["type"],
            "string"
        );
        assert!(converted["properties"]["mapStr"].get("items").is_none());
        // $ref and definitions survive untouched
        assert_eq!(
            converted["properties"]["value"]["$ref"],
            "#/definitions/testValue"
        );
        assert!(converted["definitions"]["testValue"]["properties"]["value1"].is_object());
    }

    #[test]
    fn to_json_schema_converts_nested_maps() {
        let doc = SchemaDoc::new(
            json!({
                "properties": {
                    "outer": {
                        "type": "map",
                        "items": { "type": "map", "items": { "type": "integer" } }
                    }
                }
            }),
            "nested",
        )
        .unwrap();
        let converted = doc.to_json_schema();
        let outer = &converted["properties"]["outer"];
        assert_eq!(outer["type"], "object");
        assert_eq!(outer["additionalProperties"]["type"], "object");
        assert_eq!(
            outer["additionalProperties"]["additionalProperties"]["type"],
            "integer"
        );
    }
}
