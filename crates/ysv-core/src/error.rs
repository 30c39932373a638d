//! # Error Types: Configuration Errors
//!
//! Configuration errors are fatal to a whole validation run: they are
//! surfaced to the caller immediately and never retried. Per-document
//! findings are not errors; they are reported as [`crate::Diagnostic`]s.

use std::path::PathBuf;

use thiserror::Error;

/// Error raised while interpreting validation settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The editor configuration file exists but is not valid JSON.
    #[error("malformed editor settings at '{}': {source}", path.display())]
    MalformedEditorSettings {
        /// Path to the offending settings file.
        path: PathBuf,
        /// Underlying JSON parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The editor configuration file could not be read.
    #[error("cannot read editor settings at '{}': {source}", path.display())]
    EditorSettingsIo {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A schema mapping did not have the expected shape
    /// (object of string or list-of-string values).
    #[error("invalid schema mapping: {0}")]
    InvalidSchemaMapping(String),

    /// A YAML version other than `1.1` or `1.2` was requested.
    #[error("unsupported YAML version '{0}' (expected 1.1 or 1.2)")]
    UnsupportedYamlVersion(String),

    /// An environment variable override could not be parsed.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv {
        /// Environment variable name.
        var: String,
        /// Why the value was rejected.
        reason: String,
    },
}
