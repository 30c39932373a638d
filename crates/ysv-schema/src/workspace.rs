//! Resolution of paths that a document names relative to itself.
//!
//! Used for `$schema` modelines: `../schemas/a.json` inside
//! `config/app.yml` is resolved against `config/`, and in directory-rooted
//! mode that directory is itself relative to the root.

use std::fmt::Debug;
use std::path::PathBuf;

use crate::paths::{resolve_against_document, resolve_relative};

/// Strategy for resolving a path relative to the document that mentions it.
pub trait WorkspaceContext: Send + Sync + Debug {
    /// Resolve `relative_path` as written inside `resource`.
    fn resolve_relative_path(&self, relative_path: &str, resource: &str) -> String;
}

/// Documents are named relative to a root directory.
#[derive(Debug, Clone)]
pub struct RootRelativeContext {
    root: PathBuf,
}

impl RootRelativeContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkspaceContext for RootRelativeContext {
    fn resolve_relative_path(&self, relative_path: &str, resource: &str) -> String {
        resolve_relative(Some(&self.root), relative_path, Some(resource))
            .to_string_lossy()
            .into_owned()
    }
}

/// Documents are named by a path the process can open directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRelativeContext;

impl WorkspaceContext for DocumentRelativeContext {
    fn resolve_relative_path(&self, relative_path: &str, resource: &str) -> String {
        resolve_against_document(relative_path, resource)
            .to_string_lossy()
            .into_owned()
    }
}
