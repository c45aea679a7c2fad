//! Bundle-backed record store.
//!
//! A store is built from two JSON documents: a schema bundle mapping each
//! record type to its schema, and a record bundle mapping type and id to a
//! record envelope:
//!
//! ```text
//! schemas: { "<type>": { ...schema doc... } }
//! records: { "<type>": { "<id>": { "__id": ..., "__type": ..., ... } } }
//! ```
//!
//! Bundles load from files, strings, or (with the `remote` feature) HTTP
//! URLs.

use std::path::Path;

use serde_json::{Map, Value};

use crate::connection::Connection;
use crate::error::WalkError;
use crate::record::Record;
use crate::schema::SchemaDoc;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `WalkError::FileNotFound` if the file doesn't exist,
/// `WalkError::ReadError` on IO failure, or `WalkError::InvalidJson` if
/// the content isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, WalkError> {
    if !path.exists() {
        return Err(WalkError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| WalkError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| WalkError::InvalidJson { source })
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `WalkError::InvalidJson` if the string isn't valid JSON.
pub fn load_json_str(content: &str) -> Result<Value, WalkError> {
    serde_json::from_str(content).map_err(|source| WalkError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `WalkError::NetworkError` if the request fails, or
/// `WalkError::InvalidJson` if the response isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, WalkError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| WalkError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| WalkError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    response.json().map_err(|source| WalkError::NetworkError {
        url: url.to_string(),
        source,
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path. URL
/// loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_json_auto(source: &str) -> Result<Value, WalkError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(WalkError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// An in-memory [`Connection`] over schema and record bundles.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    schemas: Map<String, Value>,
    records: Map<String, Value>,
}

impl MemoryStore {
    /// Build a store from decoded bundles.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::InvalidJson` when either bundle is not a JSON
    /// object.
    pub fn new(schemas: Value, records: Value) -> Result<Self, WalkError> {
        let Value::Object(schemas) = schemas else {
            return Err(invalid_bundle("schema"));
        };
        let Value::Object(records) = records else {
            return Err(invalid_bundle("record"));
        };
        Ok(Self { schemas, records })
    }

    /// Build a store from two JSON strings.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::InvalidJson` on parse failure or non-object
    /// bundles.
    pub fn from_strs(schema_json: &str, record_json: &str) -> Result<Self, WalkError> {
        Self::new(load_json_str(schema_json)?, load_json_str(record_json)?)
    }

    /// Build a store from two file paths or URLs.
    ///
    /// # Errors
    ///
    /// Returns loading errors from [`load_json_auto`] or bundle-shape
    /// errors from [`MemoryStore::new`].
    pub fn from_sources(schema_source: &str, record_source: &str) -> Result<Self, WalkError> {
        Self::new(load_json_auto(schema_source)?, load_json_auto(record_source)?)
    }

    /// Record types present in the record bundle.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Record ids stored under a type, empty for unknown types.
    pub fn record_ids(&self, record_type: &str) -> Vec<&str> {
        self.records
            .get(record_type)
            .and_then(Value::as_object)
            .map(|ids| ids.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn invalid_bundle(which: &str) -> WalkError {
    WalkError::InvalidJson {
        source: serde_json::Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{which} bundle must be a JSON object"),
        )),
    }
}

impl Connection for MemoryStore {
    fn get_schema(&self, record_type: &str) -> Result<SchemaDoc, WalkError> {
        let raw = self.schemas.get(record_type).ok_or_else(|| WalkError::NotFound {
            path: String::new(),
            message: format!("schema [type]=[{record_type}] does not exist"),
        })?;
        SchemaDoc::new(raw.clone(), record_type)
    }

    fn get_record(&self, record_type: &str, id: &str) -> Result<Record, WalkError> {
        let raw = self
            .records
            .get(record_type)
            .and_then(Value::as_object)
            .and_then(|ids| ids.get(id))
            .ok_or_else(|| WalkError::NotFound {
                path: String::new(),
                message: format!("record [{record_type}/{id}] does not exist"),
            })?;
        Record::from_value(raw.clone())
    }
}
