//! Error types for schema parsing, resolution and generation.

use std::path::PathBuf;
use thiserror::Error;

/// A reference whose target could not be bound.
///
/// Collected per reference node; one failure never stops the others.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("cannot resolve \"{pointer}\" at {location}: {reason}")]
pub struct UnresolvedReference {
    /// The reference string as written (e.g. `#/definitions/Foo`).
    pub pointer: String,
    /// JSON Pointer (RFC 6901) to the node carrying the reference.
    pub location: String,
    /// Why the target could not be found.
    pub reason: String,
}

/// Errors raised by the document model.
#[derive(Debug, Error)]
pub enum SchemaError {
    // IO errors (exit code 3)
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

    // Parse errors (exit code 2)
    #[error("malformed document: {source}")]
    MalformedDocument {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid \"{keyword}\" at {path}: expected {expected}, got {actual}")]
    InvalidKeyword {
        path: String,
        keyword: String,
        expected: &'static str,
        actual: String,
    },

    // Graph errors (exit code 2)
    #[error(transparent)]
    UnresolvedReference(#[from] UnresolvedReference),

    #[error("cycle through owned schemas at {path}")]
    CyclicDefinitionOverflow { path: String },

    #[error("\"{key}\" is a schema keyword and cannot be used as extension data")]
    ReservedKeyword { key: String },

    // Generation errors (exit code 2)
    #[error("unsupported type shape '{type_name}' at {path}")]
    UnsupportedTypeShape { type_name: String, path: String },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::FileNotFound { .. } | SchemaError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            SchemaError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
