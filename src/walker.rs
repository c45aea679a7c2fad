//! The walk engine.
//!
//! Descends a record's data tree and its schema in lockstep, one path step
//! at a time. Object steps move through declared properties, map steps
//! through open keyed collections, array steps select items by rendered
//! composite key. When descent arrives at a scalar whose spec carries
//! `contentMediaType: inventory/<T>`, the scalar's string value is itself a
//! path into a record of type `<T>`: the walker splices any remaining steps
//! onto it and recurses, depth-first, before anything else on the enclosing
//! path is considered.
//!
//! Value descent and schema descent are independent: a missing map key
//! yields null for the value while the spec keeps descending, so schema
//! views stay available over absent data.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::WalkError;
use crate::path::{PathExpr, Step, Suffix};
use crate::schema::{
    json_type_name, key_template, reference_type, render_key, spec_kind, spec_properties,
    KeyRenderError, SchemaDoc, SpecKind, KEY_ITEMS,
};

/// Maximum cross-record dereference depth before a walk is aborted.
///
/// Bounds runaway recursion through malformed or adversarial reference
/// chains. This is the only cycle guard: intra-schema `$ref` resolution is
/// a single non-recursive substitution and needs none.
pub const MAX_REF_DEPTH: usize = 32;

/// Resolve a path expression against a record store.
///
/// Lexes the path, fetches the root record and schema through the
/// connection, consumes the steps, and renders the terminal suffix view.
///
/// # Errors
///
/// See [`WalkError`] for the taxonomy; every failure carries the offending
/// path. Missing map keys are not failures - they yield `Value::Null`.
pub fn walk<C: Connection + ?Sized>(conn: &C, path: &str) -> Result<Value, WalkError> {
    walk_depth(conn, path, 0)
}

fn walk_depth<C: Connection + ?Sized>(
    conn: &C,
    path: &str,
    depth: usize,
) -> Result<Value, WalkError> {
    if depth > MAX_REF_DEPTH {
        return Err(WalkError::RefCycleExceeded {
            path: path.to_string(),
            limit: MAX_REF_DEPTH,
        });
    }
    debug!(path, depth, "walk");

    let expr = PathExpr::parse(path)?;
    let doc = conn
        .get_schema(&expr.record_type)
        .map_err(|e| e.at_path(path))?;
    let record = conn
        .get_record(&expr.record_type, &expr.record_id)
        .map_err(|e| e.at_path(path))?;

    let mut spec: &Value = doc.root();
    let mut value: Option<&Value> = Some(&record.data);

    for (pos, step) in expr.steps.iter().enumerate() {
        let eff = doc.resolve_ref(spec).map_err(|e| e.at_path(path))?;
        let kind = spec_kind(eff).map_err(|e| e.at_path(path))?;

        if kind.is_scalar() {
            if reference_type(eff).is_some() {
                match value {
                    Some(link) => {
                        return deref(
                            conn,
                            path,
                            eff,
                            link,
                            &expr.steps[pos..],
                            expr.suffix,
                            depth,
                        );
                    }
                    // Nil link: remaining steps yield nil; the suffix still
                    // renders against the reference spec.
                    None => break,
                }
            }
            return Err(WalkError::BadPath {
                path: path.to_string(),
                message: format!("step [{}] descends into a scalar", step.attribute),
            });
        }

        let (child_spec, child_value) = match kind {
            SpecKind::Object => {
                let child_spec = spec_properties(eff)
                    .and_then(|props| props.get(&step.attribute))
                    .ok_or_else(|| WalkError::UnknownAttribute {
                        path: path.to_string(),
                        attribute: step.attribute.clone(),
                    })?;
                (child_spec, member(value, &step.attribute, path)?)
            }
            SpecKind::Map => {
                let child_spec = eff.get(KEY_ITEMS).ok_or_else(|| WalkError::BadSchema {
                    path: path.to_string(),
                    message: "map spec missing items".into(),
                })?;
                (child_spec, member(value, &step.attribute, path)?)
            }
            SpecKind::Array => {
                return Err(WalkError::BadPath {
                    path: path.to_string(),
                    message: format!(
                        "cannot step into array items by name [{}]; index the array first",
                        step.attribute
                    ),
                });
            }
            _ => unreachable!("scalars are handled above"),
        };

        if let Some(idx) = &step.index {
            let child_eff = doc.resolve_ref(child_spec).map_err(|e| e.at_path(path))?;
            if spec_kind(child_eff).map_err(|e| e.at_path(path))? != SpecKind::Array {
                return Err(WalkError::BadPath {
                    path: path.to_string(),
                    message: format!("index [{idx}] on non-array attribute [{}]", step.attribute),
                });
            }
            let items = child_eff.get(KEY_ITEMS).ok_or_else(|| WalkError::BadSchema {
                path: path.to_string(),
                message: format!("array [{}] spec missing items", step.attribute),
            })?;
            let item_eff = doc.resolve_ref(items).map_err(|e| e.at_path(path))?;
            let template = key_template(item_eff).ok_or_else(|| WalkError::BadSchema {
                path: path.to_string(),
                message: format!("array [{}] items declare no key template", step.attribute),
            })?;

            let elem = match child_value {
                Some(Value::Array(arr)) => select_by_key(arr, template, idx, path)?,
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(WalkError::InternalInconsistency {
                        path: path.to_string(),
                        message: format!(
                            "attribute [{}] should hold an array, got {}",
                            step.attribute,
                            json_type_name(other)
                        ),
                    });
                }
            };
            spec = items;
            value = elem;
        } else {
            spec = child_spec;
            value = child_value;
        }

        // A nil value with steps remaining short-circuits to nil. Schema
        // views keep descending: spec descent is value-independent.
        if value.is_none() && pos + 1 < expr.steps.len() && expr.suffix != Suffix::Schema {
            return Ok(Value::Null);
        }
    }

    render_terminal(conn, path, &doc, spec, value, expr.suffix, depth)
}

/// Look up an attribute in the current value, tolerating absent data.
///
/// Explicit nulls normalize to absent so downstream handling is uniform.
fn member<'a>(
    value: Option<&'a Value>,
    attribute: &str,
    path: &str,
) -> Result<Option<&'a Value>, WalkError> {
    match value {
        Some(Value::Object(map)) => Ok(map.get(attribute).filter(|v| !v.is_null())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(WalkError::InternalInconsistency {
            path: path.to_string(),
            message: format!(
                "attribute [{attribute}] lookup on a non-object ({})",
                json_type_name(other)
            ),
        }),
    }
}

/// Find the unique array item whose rendered composite key matches.
fn select_by_key<'a>(
    arr: &'a [Value],
    template: &str,
    key: &str,
    path: &str,
) -> Result<Option<&'a Value>, WalkError> {
    let mut found = None;
    let mut count = 0usize;
    for item in arr {
        let rendered = render_key(template, item).map_err(|e| key_error(e, path))?;
        if rendered == key {
            found = Some(item);
            count += 1;
        }
    }
    if count > 1 {
        return Err(WalkError::AmbiguousKey {
            path: path.to_string(),
            key: key.to_string(),
            count,
        });
    }
    Ok(found)
}

fn key_error(err: KeyRenderError, path: &str) -> WalkError {
    match err {
        KeyRenderError::Malformed(_) => WalkError::BadSchema {
            path: path.to_string(),
            message: err.to_string(),
        },
        KeyRenderError::MissingField(_) | KeyRenderError::Unrenderable(_) => {
            WalkError::InternalInconsistency {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Cross a record reference: splice the remaining steps and suffix onto the
/// link target and walk the new path depth-first.
fn deref<C: Connection + ?Sized>(
    conn: &C,
    path: &str,
    spec: &Value,
    link: &Value,
    remaining: &[Step],
    suffix: Suffix,
    depth: usize,
) -> Result<Value, WalkError> {
    let target_type = reference_type(spec).expect("caller checked the reference marker");
    let Some(link) = link.as_str() else {
        return Err(WalkError::InternalInconsistency {
            path: path.to_string(),
            message: format!(
                "reference to [{target_type}] holds a {} instead of a path string",
                json_type_name(link)
            ),
        });
    };

    // Links may be rooted `<T>/...` or begin directly with an id under <T>.
    let link = link.trim_start_matches('/');
    let mut target = match link.split('/').next() {
        Some(first) if first == target_type => link.to_string(),
        _ => format!("{target_type}/{link}"),
    };
    for step in remaining {
        target.push('/');
        target.push_str(&step.to_segment());
    }
    target.push_str(suffix.as_str());

    debug!(from = path, to = %target, "crossing record reference");
    walk_depth(conn, &target, depth + 1).map_err(|e| match e {
        // The depth cap reports the path the caller asked for.
        WalkError::RefCycleExceeded { limit, .. } => WalkError::RefCycleExceeded {
            path: path.to_string(),
            limit,
        },
        other => other,
    })
}

fn render_terminal<C: Connection + ?Sized>(
    conn: &C,
    path: &str,
    doc: &SchemaDoc,
    spec: &Value,
    value: Option<&Value>,
    suffix: Suffix,
    depth: usize,
) -> Result<Value, WalkError> {
    let eff = doc.resolve_ref(spec).map_err(|e| e.at_path(path))?;

    match suffix {
        Suffix::None | Suffix::Ref => {
            if reference_type(eff).is_some() {
                return match value {
                    Some(link) => deref(conn, path, eff, link, &[], Suffix::None, depth),
                    None => Ok(Value::Null),
                };
            }
            Ok(value.cloned().unwrap_or(Value::Null))
        }
        Suffix::Raw => {
            if reference_type(eff).is_none() {
                warn!(path, "raw suffix [/$] on a non-reference position");
            }
            Ok(value.cloned().unwrap_or(Value::Null))
        }
        Suffix::Schema => Ok(eff.clone()),
        Suffix::Flat => {
            if reference_type(eff).is_some() {
                return match value {
                    Some(link) => deref(conn, path, eff, link, &[], Suffix::Flat, depth),
                    None => Ok(Value::Null),
                };
            }
            flatten(doc, eff, value, path)
        }
    }
}

/// Collapse keyed collections in a subtree to their key lists.
///
/// Maps become the ordered list of their literal keys; keyed arrays become
/// the ordered list of their rendered item keys. Scalars and non-keyed
/// subtrees pass through verbatim, nested reference links included.
fn flatten(
    doc: &SchemaDoc,
    eff: &Value,
    value: Option<&Value>,
    path: &str,
) -> Result<Value, WalkError> {
    let value = match value {
        Some(Value::Null) | None => return Ok(Value::Null),
        Some(v) => v,
    };

    match spec_kind(eff).map_err(|e| e.at_path(path))? {
        SpecKind::Object => {
            let Value::Object(entries) = value else {
                return Err(WalkError::InternalInconsistency {
                    path: path.to_string(),
                    message: format!("object position holds a {}", json_type_name(value)),
                });
            };
            let props = spec_properties(eff);
            let mut out = Map::new();
            for (name, child) in entries {
                match props.and_then(|p| p.get(name)) {
                    Some(child_spec) => {
                        let child_eff =
                            doc.resolve_ref(child_spec).map_err(|e| e.at_path(path))?;
                        out.insert(name.clone(), flatten(doc, child_eff, Some(child), path)?);
                    }
                    // Undeclared attribute: nothing to collapse by.
                    None => {
                        out.insert(name.clone(), child.clone());
                    }
                }
            }
            Ok(Value::Object(out))
        }
        SpecKind::Map => {
            let Value::Object(entries) = value else {
                return Err(WalkError::InternalInconsistency {
                    path: path.to_string(),
                    message: format!("map position holds a {}", json_type_name(value)),
                });
            };
            Ok(Value::Array(
                entries.keys().cloned().map(Value::String).collect(),
            ))
        }
        SpecKind::Array => {
            let Value::Array(arr) = value else {
                return Err(WalkError::InternalInconsistency {
                    path: path.to_string(),
                    message: format!("array position holds a {}", json_type_name(value)),
                });
            };
            let Some(items) = eff.get(KEY_ITEMS) else {
                return Ok(value.clone());
            };
            let item_eff = doc.resolve_ref(items).map_err(|e| e.at_path(path))?;
            match key_template(item_eff) {
                Some(template) => {
                    let keys = arr
                        .iter()
                        .map(|item| {
                            render_key(template, item)
                                .map(Value::String)
                                .map_err(|e| key_error(e, path))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Array(keys))
                }
                None => Ok(value.clone()),
            }
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(
            json!({
                "host": {
                    "name": "host",
                    "properties": {
                        "name": { "type": "string" },
                        "ports": {
                            "type": "array",
                            "items": { "type": "object", "$ref": "#/definitions/port" }
                        },
                        "peer": {
                            "type": "string",
                            "contentMediaType": "inventory/host"
                        }
                    },
                    "definitions": {
                        "port": {
                            "key": "{name}",
                            "properties": {
                                "name": { "type": "string" },
                                "speed": { "type": "integer" }
                            }
                        }
                    }
                }
            }),
            json!({
                "host": {
                    "h1": {
                        "__id": "h1", "__type": "host", "__ver": "0.0.1",
                        "data": {
                            "name": "h1",
                            "ports": [
                                { "name": "eth0", "speed": 10 },
                                { "name": "eth1", "speed": 25 }
                            ],
                            "peer": "h2/name"
                        }
                    },
                    "h2": {
                        "__id": "h2", "__type": "host", "__ver": "0.0.1",
                        "data": { "name": "h2", "ports": [], "peer": "h1/name" }
                    },
                    "loop": {
                        "__id": "loop", "__type": "host", "__ver": "0.0.1",
                        "data": { "name": "loop", "ports": [], "peer": "loop/peer" }
                    },
                    "dup": {
                        "__id": "dup", "__type": "host", "__ver": "0.0.1",
                        "data": {
                            "name": "dup",
                            "ports": [
                                { "name": "eth0", "speed": 10 },
                                { "name": "eth0", "speed": 40 }
                            ]
                        }
                    }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn root_walk_returns_data_unchanged() {
        let value = walk(&store(), "host/h1").unwrap();
        assert_eq!(value["name"], "h1");
        assert_eq!(value["ports"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn keyed_array_selection() {
        let value = walk(&store(), "host/h1/ports[eth1]/speed").unwrap();
        assert_eq!(value, json!(25));
    }

    #[test]
    fn missing_key_yields_null() {
        let value = walk(&store(), "host/h1/ports[eth9]").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn duplicate_key_is_ambiguous() {
        let err = walk(&store(), "host/dup/ports[eth0]").unwrap_err();
        assert!(matches!(err, WalkError::AmbiguousKey { count: 2, .. }));
    }

    #[test]
    fn unknown_attribute_is_schema_driven() {
        let err = walk(&store(), "host/h1/bogus").unwrap_err();
        assert!(matches!(err, WalkError::UnknownAttribute { .. }));
    }

    #[test]
    fn step_into_plain_scalar_fails() {
        let err = walk(&store(), "host/h1/name/deeper").unwrap_err();
        assert!(matches!(err, WalkError::BadPath { .. }));
    }

    #[test]
    fn reference_dereferences_by_default() {
        assert_eq!(walk(&store(), "host/h1/peer").unwrap(), json!("h2"));
    }

    #[test]
    fn raw_suffix_returns_link_text() {
        assert_eq!(walk(&store(), "host/h1/peer/$").unwrap(), json!("h2/name"));
    }

    #[test]
    fn reference_cycle_hits_depth_limit() {
        let err = walk(&store(), "host/loop/peer").unwrap_err();
        assert!(matches!(err, WalkError::RefCycleExceeded { limit, .. } if limit == MAX_REF_DEPTH));
    }

    #[test]
    fn index_on_non_array_fails() {
        let err = walk(&store(), "host/h1/name[x]").unwrap_err();
        assert!(matches!(err, WalkError::BadPath { .. }));
    }

    #[test]
    fn flat_view_collapses_keyed_arrays() {
        let value = walk(&store(), "host/h1?flat").unwrap();
        assert_eq!(value["ports"], json!(["eth0", "eth1"]));
        assert_eq!(value["name"], "h1");
        // nested reference links stay raw in the flat view
        assert_eq!(value["peer"], "h2/name");
    }

    #[test]
    fn schema_view_is_value_independent() {
        let value = walk(&store(), "host/h2/ports[eth0]?schema").unwrap();
        assert_eq!(value["key"], "{name}");
        assert_eq!(value["properties"]["speed"]["type"], "integer");
    }
}
