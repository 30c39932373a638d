//! # Settings Resolution
//!
//! Turns the caller's [`Settings`] into what one run needs: an optional
//! root directory, an optional workspace context for document-relative
//! paths, and the effective schema mapping.
//!
//! | Settings | Root | Workspace context | Mapping |
//! |----------|------|-------------------|---------|
//! | `Root` with mapping | `root_dir` | root-relative | as given |
//! | `Root` without mapping | `root_dir` | root-relative | `yaml.schemas` from `<root>/.vscode/settings.json`, or empty |
//! | `Schema` | none | document-relative | `{schema: ["*"]}` |
//! | none | none | none | empty |
//!
//! A malformed editor settings file fails the run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use ysv_core::{BaseSettings, ConfigError, SchemaMapping, Settings};
use ysv_schema::{DocumentRelativeContext, RootRelativeContext, WorkspaceContext};

/// Editor configuration directory under the root.
pub const EDITOR_SETTINGS_DIR: &str = ".vscode";

/// Editor configuration file name.
pub const EDITOR_SETTINGS_FILE: &str = "settings.json";

/// Settings for one run, with the mapping already decided.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSettings {
    pub root_dir: Option<PathBuf>,
    pub workspace: Option<Arc<dyn WorkspaceContext>>,
    pub schema_mapping: SchemaMapping,
    pub base: BaseSettings,
}

impl ResolvedSettings {
    /// Where the orchestrator reads `document` from.
    pub fn document_path(&self, document: &str) -> PathBuf {
        match &self.root_dir {
            Some(root) => root.join(document),
            None => PathBuf::from(document),
        }
    }
}

#[derive(Deserialize)]
struct EditorSettings {
    #[serde(rename = "yaml.schemas", default)]
    yaml_schemas: Option<SchemaMapping>,
}

/// Resolve the caller's settings for one run.
pub async fn resolve_settings(settings: Option<&Settings>) -> Result<ResolvedSettings, ConfigError> {
    let Some(settings) = settings else {
        tracing::debug!("no settings given; every document passes");
        return Ok(ResolvedSettings::default());
    };

    match settings {
        Settings::Root(root) => {
            let schema_mapping = match &root.schema_mapping {
                Some(mapping) => mapping.clone(),
                None => read_editor_settings(&root.root_dir).await?,
            };
            Ok(ResolvedSettings {
                root_dir: Some(root.root_dir.clone()),
                workspace: Some(Arc::new(RootRelativeContext::new(&root.root_dir))),
                schema_mapping,
                base: root.base.clone(),
            })
        }
        Settings::Schema(schema) => Ok(ResolvedSettings {
            root_dir: None,
            workspace: Some(Arc::new(DocumentRelativeContext)),
            schema_mapping: SchemaMapping::single(schema.schema.clone(), "*"),
            base: schema.base.clone(),
        }),
    }
}

/// Read `yaml.schemas` from `<root>/.vscode/settings.json`.
///
/// A missing file, or a file without the field, yields an empty mapping.
pub async fn read_editor_settings(root: &Path) -> Result<SchemaMapping, ConfigError> {
    let path = root.join(EDITOR_SETTINGS_DIR).join(EDITOR_SETTINGS_FILE);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no editor settings; schema mapping is empty");
            return Ok(SchemaMapping::new());
        }
        Err(source) => return Err(ConfigError::EditorSettingsIo { path, source }),
    };

    let settings: EditorSettings = serde_json::from_str(&text)
        .map_err(|source| ConfigError::MalformedEditorSettings {
            path: path.clone(),
            source,
        })?;
    let mapping = settings.yaml_schemas.unwrap_or_default();
    tracing::debug!(path = %path.display(), schemas = mapping.len(), "loaded schema mapping from editor settings");
    Ok(mapping)
}
