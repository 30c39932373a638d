//! # ysv-validate
//!
//! Validates batches of YAML documents against JSON Schemas and returns
//! one [`FileValidationResult`] per failing document.
//!
//! Three entry points:
//!
//! - [`get_validation_results`]: validate an explicit list of documents.
//! - [`validate_directory`]: validate every `.yml`/`.yaml` file under a root.
//! - [`validate_with_schema`]: validate the files matched by glob patterns
//!   against a single schema.
//!
//! Schema problems (unreachable, malformed, failed to compile) are reported
//! as diagnostics on the documents they govern. Only configuration errors,
//! registration errors and unreadable documents (under the default policy)
//! fail a run.
//!
//! ## Example
//!
//! ```no_run
//! use ysv_core::{BaseSettings, RootSettings, SchemaMapping, Settings};
//!
//! # async fn run() -> Result<(), ysv_validate::ValidateError> {
//! let settings = Settings::Root(RootSettings {
//!     root_dir: "config".into(),
//!     schema_mapping: Some(SchemaMapping::single("schemas/app.json", "*.yml")),
//!     base: BaseSettings::default(),
//! });
//! let files = vec!["app.yml".to_string()];
//! for result in ysv_validate::get_validation_results(&files, Some(&settings)).await? {
//!     for entry in &result.errors {
//!         println!("{}:{}", result.file_path, entry.diagnostic);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod orchestrator;
pub mod scan;
pub mod settings;

use std::path::Path;

use ysv_core::{BaseSettings, FileValidationResult, RootSettings, SchemaMapping, SchemaSettings, Settings};
use ysv_schema::FetchConfig;

pub use error::ValidateError;
pub use orchestrator::{build_service, Orchestrator};
pub use scan::{expand_patterns, scan_yaml_files};
pub use settings::{read_editor_settings, resolve_settings, ResolvedSettings};

/// Validate `files` under `settings`, with fetch options from the
/// environment.
///
/// In root mode the paths are relative to the root directory. Without
/// settings every document passes.
pub async fn get_validation_results(
    files: &[String],
    settings: Option<&Settings>,
) -> Result<Vec<FileValidationResult>, ValidateError> {
    let fetch = FetchConfig::from_env()?;
    get_validation_results_with(files, settings, &fetch).await
}

/// [`get_validation_results`] with explicit fetch options.
pub async fn get_validation_results_with(
    files: &[String],
    settings: Option<&Settings>,
    fetch: &FetchConfig,
) -> Result<Vec<FileValidationResult>, ValidateError> {
    let resolved = resolve_settings(settings).await?;
    let service = build_service(&resolved, fetch)?;
    Orchestrator::new(service, resolved).run(files).await
}

/// Validate every YAML file under `root_dir`.
///
/// Without `schema_mapping` the mapping comes from the editor settings
/// file under the root.
pub async fn validate_directory(
    base: BaseSettings,
    root_dir: &Path,
    schema_mapping: Option<SchemaMapping>,
) -> Result<Vec<FileValidationResult>, ValidateError> {
    let scan_root = root_dir.to_path_buf();
    let files = tokio::task::spawn_blocking(move || scan_yaml_files(&scan_root))
        .await??;

    let settings = Settings::Root(RootSettings {
        root_dir: root_dir.to_path_buf(),
        schema_mapping,
        base,
    });
    get_validation_results(&files, Some(&settings)).await
}

/// Validate the files matched by `patterns` against `schema`.
///
/// Patterns are globs relative to the working directory; matches are
/// validated in pattern order.
pub async fn validate_with_schema(
    base: BaseSettings,
    schema: &str,
    patterns: &[String],
) -> Result<Vec<FileValidationResult>, ValidateError> {
    let files = expand_patterns(patterns)?;
    let settings = Settings::Schema(SchemaSettings {
        schema: schema.to_string(),
        base,
    });
    get_validation_results(&files, Some(&settings)).await
}
