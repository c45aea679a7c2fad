//! The capability bundle the walker consumes.

use crate::error::WalkError;
use crate::record::Record;
use crate::schema::SchemaDoc;

/// Storage capabilities supplied by the host.
///
/// Both operations are synchronous; they are the only points where a walk
/// may block on I/O. The walker calls them freely and never caches - a
/// host desiring caching supplies a caching implementation. Schema
/// documents and records handed out here are treated as immutable for the
/// duration of a walk.
pub trait Connection {
    /// Fetch the schema governing a record type.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::NotFound` for an unknown type.
    fn get_schema(&self, record_type: &str) -> Result<SchemaDoc, WalkError>;

    /// Fetch a record by type and id.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::NotFound` for an unknown type or id.
    fn get_record(&self, record_type: &str, id: &str) -> Result<Record, WalkError>;
}
