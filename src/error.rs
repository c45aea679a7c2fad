//! Error types for path walking, schema handling, and store loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the walker, the path lexer, and the record store.
///
/// Every walk failure carries the offending path as context. Variants map
/// to the CLI exit codes via [`WalkError::exit_code`]: IO and missing
/// records exit 3, everything else 2.
#[derive(Debug, Error)]
pub enum WalkError {
    // Path and walk errors (exit code 2)
    #[error("bad path [{path}]: {message}")]
    BadPath { path: String, message: String },

    #[error("bad schema at [{path}]: {message}")]
    BadSchema { path: String, message: String },

    #[error("unknown attribute \"{attribute}\" at [{path}]")]
    UnknownAttribute { path: String, attribute: String },

    #[error("ambiguous key \"{key}\" at [{path}]: {count} items share it")]
    AmbiguousKey {
        path: String,
        key: String,
        count: usize,
    },

    #[error("reference depth limit ({limit}) exceeded at [{path}]")]
    RefCycleExceeded { path: String, limit: usize },

    #[error("record diverges from schema at [{path}]: {message}")]
    InternalInconsistency { path: String, message: String },

    // Store errors
    #[error("not found: {message} (walking [{path}])")]
    NotFound { path: String, message: String },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid record: {message}")]
    InvalidRecord { message: String },
}

impl WalkError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } | Self::FileNotFound { .. } | Self::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            Self::NetworkError { .. } => 3,
            _ => 2,
        }
    }

    /// Replace the path context on walk-level variants.
    ///
    /// Connection errors arrive without knowledge of the path being walked;
    /// the walker stamps them so the caller sees where the failure arose.
    pub(crate) fn at_path(self, walk_path: &str) -> Self {
        match self {
            Self::BadPath { message, .. } => Self::BadPath {
                path: walk_path.to_string(),
                message,
            },
            Self::BadSchema { message, .. } => Self::BadSchema {
                path: walk_path.to_string(),
                message,
            },
            Self::NotFound { message, .. } => Self::NotFound {
                path: walk_path.to_string(),
                message,
            },
            other => other,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors during record validation against a schema.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Walk(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}
