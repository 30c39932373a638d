//! Schema acquisition and compilation errors.

use std::path::PathBuf;

use thiserror::Error;

/// Error while resolving, fetching or compiling a schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema identifier was empty.
    #[error("no schema specified")]
    NoSchemaSpecified,

    /// The identifier resolved to a scheme other than file, http or https.
    #[error("unsupported schema source '{identifier}': scheme '{scheme}' is not file, http or https")]
    UnsupportedScheme {
        identifier: String,
        scheme: String,
    },

    /// The identifier could not be interpreted as a path or URI.
    #[error("invalid schema identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: String,
    },

    /// A local schema file could not be read.
    #[error("could not read schema file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote schema request failed at the transport level.
    #[error("could not fetch schema '{identifier}': {source}")]
    Fetch {
        identifier: String,
        #[source]
        source: reqwest::Error,
    },

    /// A remote schema request completed with a non-success status.
    #[error("could not fetch schema '{identifier}': HTTP status {status}")]
    HttpStatus { identifier: String, status: u16 },

    /// The schema text is not valid JSON.
    #[error("schema '{identifier}' is not valid JSON: {source}")]
    InvalidJson {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },

    /// The schema is valid JSON but not a usable JSON Schema.
    #[error("schema '{identifier}' could not be compiled: {reason}")]
    Compile { identifier: String, reason: String },

    /// A document glob pattern could not be compiled.
    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(#[source] reqwest::Error),
}
