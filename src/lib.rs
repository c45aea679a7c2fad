//! Schema Path Resolver
//!
//! Schema-aware hierarchical path resolution over typed, versioned records.
//!
//! Given a path expression and a record store, [`walk`] descends a record's
//! data tree and its schema in lockstep - through objects, keyed maps, and
//! arrays addressed by composite keys - and transparently crosses record
//! boundaries where the schema marks a scalar as a reference to another
//! record. Terminal suffixes select alternate views: `?schema` renders the
//! governing schema fragment, `?flat` collapses keyed collections to their
//! key lists, `/$` returns raw link text, `?ref` forces dereference.
//!
//! # Example
//!
//! ```
//! use schema_path::{walk, MemoryStore};
//! use serde_json::json;
//!
//! let store = MemoryStore::new(
//!     json!({
//!         "host": {
//!             "name": "host",
//!             "properties": {
//!                 "addrs": { "type": "map", "items": { "type": "string" } }
//!             }
//!         }
//!     }),
//!     json!({
//!         "host": {
//!             "web01": {
//!                 "__id": "web01",
//!                 "__type": "host",
//!                 "__ver": "0.0.1",
//!                 "data": { "addrs": { "mgmt": "10.0.0.1" } }
//!             }
//!         }
//!     }),
//! )
//! .unwrap();
//!
//! let value = walk(&store, "host/web01/addrs/mgmt").unwrap();
//! assert_eq!(value, json!("10.0.0.1"));
//!
//! // Missing map keys are null, never errors
//! let value = walk(&store, "host/web01/addrs/backup").unwrap();
//! assert!(value.is_null());
//! ```
//!
//! # Path syntax
//!
//! ```text
//! path     = type "/" id ( "/" step )* suffix?
//! step     = name ( "[" index "]" )?
//! suffix   = "/$" | "?schema" | "?ref" | "?flat"
//! ```
//!
//! Array indices are composite keys rendered from the item schema's `key`
//! template: with `"key": "{key1}_{key2}"`, the item `{"key1": "01",
//! "key2": "02"}` is addressed as `attr[01_02]`.
//!
//! # Storage
//!
//! The resolver is storage-agnostic: it pulls schemas and records through
//! the [`Connection`] trait. [`MemoryStore`] is a bundle-backed
//! implementation used by the CLI and tests.

mod connection;
mod error;
mod linter;
mod path;
mod record;
mod schema;
mod store;
mod validator;
mod walker;

pub use connection::Connection;
pub use error::{ValidateError, ValidationError, WalkError};
pub use linter::{
    lint_bundle, lint_schema, Diagnostic, LintResult, SchemaResult, SchemaStatus, Severity,
};
pub use path::{parse_array_path, PathExpr, Step, Suffix};
pub use record::{Record, KEY_RECORD_DATA, KEY_RECORD_ID, KEY_RECORD_TYPE, KEY_RECORD_VER};
pub use schema::{
    key_template, reference_type, render_key, spec_kind, template_fields, KeyRenderError,
    SchemaDoc, SpecKind, INVENTORY_PREFIX, REF_PREFIX,
};
pub use store::{is_url, load_json, load_json_auto, load_json_str, MemoryStore};
pub use validator::{validate_against_schema, validate_record};
pub use walker::{walk, MAX_REF_DEPTH};

#[cfg(feature = "remote")]
pub use store::load_json_url;
