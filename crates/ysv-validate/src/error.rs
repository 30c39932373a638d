//! Run-level errors.
//!
//! Anything here aborts the whole run. Schema violations and schema load
//! failures are never errors; they come back as diagnostics.

use std::path::PathBuf;

use thiserror::Error;
use ysv_core::ConfigError;
use ysv_schema::SchemaError;

/// Error that aborts a validation run.
#[derive(Error, Debug)]
pub enum ValidateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Schema registration failed (unsupported scheme, malformed pattern).
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An input document could not be read.
    #[error("cannot read document '{}': {source}", path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root directory could not be scanned.
    #[error("cannot scan '{}': {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The directory scan task panicked or was cancelled.
    #[error("directory scan did not complete: {0}")]
    ScanTask(#[from] tokio::task::JoinError),

    /// A document glob pattern is malformed.
    #[error("invalid document pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
