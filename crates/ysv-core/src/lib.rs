//! # ysv-core: Shared Data Model
//!
//! Foundational types used by every crate in the YAML schema validator:
//!
//! - [`types`]: positions, ranges, diagnostics, explanatory content and
//!   the per-file [`FileValidationResult`] returned to callers.
//! - [`settings`]: the validation settings union, the schema mapping
//!   table and the YAML language version.
//! - [`error`]: configuration errors raised while interpreting settings.
//!
//! ## Crate Policy
//!
//! - No I/O. Reading editor configuration files and schemas belongs to
//!   `ysv-validate` and `ysv-schema`.
//! - Positions are zero-based (line and character), matching the
//!   editor-protocol conventions diagnostics are usually rendered with.

pub mod error;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use settings::{
    BaseSettings, RawSettings, RootSettings, SchemaMapping, SchemaSettings, Settings,
    UnreadableDocumentPolicy, YamlVersion,
};
pub use types::{
    Diagnostic, DiagnosticSeverity, ErrorEntry, Explanation, FileValidationResult, Position, Range,
};
