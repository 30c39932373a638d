//! # Schema Service
//!
//! The validation engine. Holds the schema registry, fetches and compiles
//! schemas on demand, and validates [`TextDocument`]s against every schema
//! that governs them.
//!
//! ## Compile Cache
//!
//! Compiled schemas are cached by location URI. Each entry is a
//! `tokio::sync::OnceCell`, so concurrent documents that need the same
//! schema share one fetch and one compile. A failed load is cached too
//! and reported on every document that needs it. The map itself sits
//! behind a `parking_lot::Mutex` that is never held across an `.await`.
//!
//! ## References
//!
//! Before compiling, external `$ref` targets are fetched with the same
//! fetcher and handed to `jsonschema` through an in-memory retriever.
//! Meta-schemas on json-schema.org are left to `jsonschema`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;
use ysv_core::{Diagnostic, Explanation, Position, Range, YamlVersion};

use crate::document::TextDocument;
use crate::engine::{ExplanationProvider, ValidationEngine};
use crate::error::SchemaError;
use crate::explain::SchemaView;
use crate::fetch::SchemaFetcher;
use crate::paths::{file_url_to_path, is_relative_path, SchemaLocation};
use crate::registry::SchemaRegistry;
use crate::workspace::WorkspaceContext;

/// Diagnostic source for schema load failures.
pub const LOAD_FAILURE_SOURCE: &str = "ysv";

/// Prefix of the diagnostic source for schema violations.
pub const SCHEMA_SOURCE_PREFIX: &str = "yaml-schema: ";

/// Upper bound on referenced documents fetched for one schema.
const MAX_REFERENCED_DOCUMENTS: usize = 256;

/// Engine options fixed for a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    pub yaml_version: YamlVersion,
    /// Close object schemas that declare `properties` but no `additionalProperties`.
    pub disable_additional_properties: bool,
}

/// A schema ready for validation.
pub struct CompiledSchema {
    pub uri: Url,
    pub root: Value,
    pub resources: HashMap<String, Value>,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("uri", &self.uri.as_str())
            .field("resource_count", &self.resources.len())
            .finish()
    }
}

impl CompiledSchema {
    /// `yaml-schema: <title>`, or the URI when the schema has no title.
    pub fn diagnostic_source(&self) -> String {
        let name = self
            .root
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map_or_else(|| self.uri.to_string(), str::to_string);
        format!("{SCHEMA_SOURCE_PREFIX}{name}")
    }

    fn view(&self) -> SchemaView<'_> {
        SchemaView {
            root: &self.root,
            base: &self.uri,
            resources: &self.resources,
        }
    }
}

type CompileResult = Result<Arc<CompiledSchema>, String>;

/// Registry, compile cache and validation engine for one run.
pub struct SchemaService {
    fetcher: SchemaFetcher,
    workspace: Option<Arc<dyn WorkspaceContext>>,
    options: RwLock<ServiceOptions>,
    registry: RwLock<SchemaRegistry>,
    compiled: Mutex<HashMap<String, Arc<OnceCell<CompileResult>>>>,
}

impl std::fmt::Debug for SchemaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaService")
            .field("root", &self.fetcher.root())
            .field("workspace", &self.workspace)
            .field("options", &*self.options.read())
            .field("schema_count", &self.registry.read().len())
            .finish()
    }
}

impl SchemaService {
    /// `workspace` resolves relative modeline paths; without one they are
    /// resolved like any other identifier.
    pub fn new(fetcher: SchemaFetcher, workspace: Option<Arc<dyn WorkspaceContext>>) -> Self {
        Self {
            fetcher,
            workspace,
            options: RwLock::new(ServiceOptions::default()),
            registry: RwLock::new(SchemaRegistry::new()),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    /// Set the engine options. Changing them drops compiled schemas.
    pub fn configure(&self, options: ServiceOptions) {
        let mut current = self.options.write();
        if *current != options {
            *current = options;
            self.compiled.lock().clear();
        }
    }

    pub fn options(&self) -> ServiceOptions {
        *self.options.read()
    }

    /// Give `identifier` a priority. Higher tiers shadow lower ones.
    pub fn add_schema_priority(&self, identifier: &str, priority: i32) {
        self.registry.write().set_priority(identifier, priority);
    }

    /// Register `identifier` for documents matching `patterns`.
    ///
    /// The identifier is resolved immediately, so an unsupported scheme
    /// fails here rather than on every document.
    pub fn register_external_schema(&self, identifier: &str, patterns: &[String]) -> Result<(), SchemaError> {
        let location = self.fetcher.locate(identifier)?;
        tracing::debug!(schema = %identifier, location = %location, ?patterns, "registering schema");
        self.registry.write().register(identifier, location, patterns)
    }

    pub fn schema_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Schemas that apply to `document`: every registered schema in the
    /// top matching tier, or the modeline schema instead of them. A
    /// document no pattern governs gets nothing, modeline or not.
    fn schemas_for(&self, document: &TextDocument) -> Vec<Result<SchemaLocation, (String, String)>> {
        let matched: Vec<SchemaLocation> = self
            .registry
            .read()
            .matching(document.uri())
            .into_iter()
            .map(|s| s.location.clone())
            .collect();
        if matched.is_empty() {
            return Vec::new();
        }
        let Some(id) = document.schema_modeline() else {
            return matched.into_iter().map(Ok).collect();
        };
        let identifier = match &self.workspace {
            Some(workspace) if is_relative_path(id) => {
                workspace.resolve_relative_path(id, document.uri())
            }
            _ => id.to_string(),
        };
        tracing::debug!(document = %document.uri(), schema = %identifier, "schema selected by modeline");
        vec![self
            .fetcher
            .locate(&identifier)
            .map_err(|e| (identifier, e.to_string()))]
    }

    /// The compiled schema at `location`, compiling it on first use.
    pub async fn compiled(&self, location: &SchemaLocation) -> CompileResult {
        let uri = location.uri().map_err(|e| e.to_string())?;
        let cell = {
            let mut cache = self.compiled.lock();
            cache.entry(uri.to_string()).or_default().clone()
        };
        cell.get_or_init(|| async {
            self.compile(location, uri.clone()).await.map(Arc::new).map_err(|e| {
                tracing::warn!(schema = %uri, error = %e, "schema could not be loaded");
                e.to_string()
            })
        })
        .await
        .clone()
    }

    async fn compile(&self, location: &SchemaLocation, uri: Url) -> Result<CompiledSchema, SchemaError> {
        let text = self.fetcher.fetch_location(location).await?;
        let mut root: Value = serde_json::from_str(&text).map_err(|source| SchemaError::InvalidJson {
            identifier: uri.to_string(),
            source,
        })?;
        let base = assign_base_id(&mut root, &uri);
        let mut resources = self.prefetch_references(&root, &base).await;

        if self.options().disable_additional_properties {
            close_objects(&mut root);
            resources.values_mut().for_each(close_objects);
        }

        let retriever = InMemoryRetriever {
            resources: resources.clone(),
        };
        let validator = jsonschema::options()
            .with_retriever(retriever)
            .build(&root)
            .map_err(|e| SchemaError::Compile {
                identifier: uri.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(schema = %uri, references = resources.len(), "compiled schema");
        Ok(CompiledSchema {
            uri: base,
            root,
            resources,
            validator,
        })
    }

    /// Fetch every document reachable through external `$ref`s.
    async fn prefetch_references(&self, root: &Value, base: &Url) -> HashMap<String, Value> {
        let mut resources = HashMap::new();
        let mut seen: HashSet<String> = HashSet::from([document_key(base)]);
        let mut queue: VecDeque<Url> = external_references(root, base).into();

        while let Some(target) = queue.pop_front() {
            let key = document_key(&target);
            if !seen.insert(key.clone()) || is_meta_schema(&target) {
                continue;
            }
            if resources.len() >= MAX_REFERENCED_DOCUMENTS {
                tracing::warn!(schema = %base, "too many referenced schema documents; skipping the rest");
                break;
            }
            let location = match target.scheme() {
                "http" | "https" => SchemaLocation::Remote(target.clone()),
                "file" => match file_url_to_path(&target) {
                    Ok(path) => SchemaLocation::File(path),
                    Err(_) => continue,
                },
                _ => continue,
            };
            let fetched = match self.fetcher.fetch_location(&location).await {
                Ok(text) => serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match fetched {
                Ok(mut document) => {
                    let doc_base = assign_base_id(&mut document, &target);
                    queue.extend(external_references(&document, &doc_base));
                    resources.insert(key, document);
                }
                Err(error) => {
                    tracing::warn!(reference = %target, error = %error, "could not load referenced schema");
                }
            }
        }
        resources
    }
}

/// Diagnostic placed at the top of a document whose schema failed to load.
pub fn load_failure_diagnostic(schema: &str, reason: &str) -> Diagnostic {
    Diagnostic::error(
        Range::document_start(),
        format!("Unable to load schema from '{schema}': {reason}"),
        Some(LOAD_FAILURE_SOURCE.to_string()),
    )
}

#[async_trait]
impl ValidationEngine for SchemaService {
    async fn validate(&self, document: &TextDocument) -> Vec<Diagnostic> {
        let targets = self.schemas_for(document);
        if targets.is_empty() {
            return Vec::new();
        }
        let parsed = document.parse(self.options().yaml_version);
        let mut diagnostics = parsed.structural_diagnostics();

        for target in targets {
            let location = match target {
                Ok(location) => location,
                Err((identifier, reason)) => {
                    diagnostics.push(load_failure_diagnostic(&identifier, &reason));
                    continue;
                }
            };
            let schema = match self.compiled(&location).await {
                Ok(schema) => schema,
                Err(reason) => {
                    let shown = location.uri().map_or_else(|_| location.to_string(), |u| u.to_string());
                    diagnostics.push(load_failure_diagnostic(&shown, &reason));
                    continue;
                }
            };
            let source = schema.diagnostic_source();
            for doc in parsed.documents.iter().filter(|d| !d.value.is_null()) {
                for error in schema.validator.iter_errors(&doc.value) {
                    let pointer = error.instance_path.to_string();
                    diagnostics.push(Diagnostic::error(
                        doc.range_for_pointer(&pointer),
                        error.to_string(),
                        Some(source.clone()),
                    ));
                }
            }
        }
        diagnostics
    }
}

#[async_trait]
impl ExplanationProvider for SchemaService {
    async fn explain(&self, document: &TextDocument, position: Position) -> Option<Explanation> {
        let parsed = document.parse(self.options().yaml_version);
        let doc = parsed.document_at(position)?;
        let node = doc.node_at(position)?;
        let (pointer, range) = (node.pointer.clone(), node.diagnostic_range());

        for location in self.schemas_for(document).into_iter().flatten() {
            let Ok(schema) = self.compiled(&location).await else {
                continue;
            };
            if let Some(description) = schema.view().describe(&pointer) {
                return Some(Explanation {
                    contents: description.to_markdown(&schema.uri),
                    range: Some(range),
                });
            }
        }
        None
    }
}

/// Serves prefetched documents to `jsonschema` during compilation.
struct InMemoryRetriever {
    resources: HashMap<String, Value>,
}

impl jsonschema::Retrieve for InMemoryRetriever {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let key = uri_str.split('#').next().unwrap_or(uri_str);
        self.resources
            .get(key)
            .cloned()
            .ok_or_else(|| format!("referenced schema not available: {uri_str}").into())
    }
}

fn document_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

fn is_meta_schema(url: &Url) -> bool {
    matches!(url.host_str(), Some("json-schema.org") | Some("www.json-schema.org"))
}

/// Draft 3 and 4 use `id`; later drafts use `$id`.
fn id_keyword(schema: &Value) -> &'static str {
    let legacy = schema
        .get("$schema")
        .and_then(Value::as_str)
        .is_some_and(|s| s.contains("draft-04") || s.contains("draft-03"));
    if legacy {
        "id"
    } else {
        "$id"
    }
}

/// Make sure the schema carries an absolute base URI and return it.
fn assign_base_id(schema: &mut Value, location: &Url) -> Url {
    let keyword = id_keyword(schema);
    let Value::Object(map) = schema else {
        return location.clone();
    };
    let declared = map
        .get(keyword)
        .and_then(Value::as_str)
        .and_then(|id| location.join(id).ok());
    let mut base = declared.unwrap_or_else(|| location.clone());
    base.set_fragment(None);
    map.insert(keyword.to_string(), Value::String(base.to_string()));
    base
}

/// Absolute targets of every non-local `$ref` in `schema`.
fn external_references(schema: &Value, base: &Url) -> Vec<Url> {
    let mut found = Vec::new();
    let mut stack = vec![schema];
    while let Some(node) = stack.pop() {
        match node {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    if !reference.starts_with('#') {
                        if let Ok(mut target) = base.join(reference) {
                            target.set_fragment(None);
                            found.push(target);
                        }
                    }
                }
                stack.extend(map.values());
            }
            Value::Array(items) => stack.extend(items.iter()),
            _ => {}
        }
    }
    found
}

/// Add `additionalProperties: false` to every object schema that lists
/// `properties` without saying whether others are allowed.
fn close_objects(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if map.get("properties").is_some_and(Value::is_object)
                && !map.contains_key("additionalProperties")
                && !map.contains_key("patternProperties")
            {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            map.values_mut().for_each(close_objects);
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::DocumentRelativeContext;
    use serde_json::json;

    fn service(root: Option<std::path::PathBuf>) -> SchemaService {
        SchemaService::new(
            SchemaFetcher::with_client(root, reqwest::Client::new()),
            Some(Arc::new(DocumentRelativeContext)),
        )
    }

    #[test]
    fn base_id_is_inserted_or_resolved() {
        let location = Url::parse("file:///s/schema.json").unwrap();

        let mut schema = json!({"type": "object"});
        assert_eq!(assign_base_id(&mut schema, &location), location);
        assert_eq!(schema["$id"], "file:///s/schema.json");

        let mut schema = json!({"$id": "https://example.com/a.json#"});
        let base = assign_base_id(&mut schema, &location);
        assert_eq!(base.as_str(), "https://example.com/a.json");

        let mut schema = json!({"$schema": "http://json-schema.org/draft-04/schema#"});
        assign_base_id(&mut schema, &location);
        assert_eq!(schema["id"], "file:///s/schema.json");
        assert!(schema.get("$id").is_none());
    }

    #[test]
    fn references_skip_local_fragments() {
        let base = Url::parse("file:///s/schema.json").unwrap();
        let schema = json!({
            "properties": {
                "a": {"$ref": "#/definitions/a"},
                "b": {"$ref": "common.json#/definitions/b"},
                "c": {"items": {"$ref": "https://example.com/c.json"}}
            }
        });
        let mut refs: Vec<String> = external_references(&schema, &base)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        refs.sort();
        assert_eq!(refs, vec!["file:///s/common.json", "https://example.com/c.json"]);
    }

    #[test]
    fn closing_objects_respects_explicit_choices() {
        let mut schema = json!({
            "properties": {"a": {"type": "object", "properties": {"x": {}}}},
            "definitions": {
                "open": {"properties": {"y": {}}, "additionalProperties": true},
                "patterned": {"properties": {"z": {}}, "patternProperties": {"^z": {}}}
            }
        });
        close_objects(&mut schema);
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["a"]["additionalProperties"], false);
        assert_eq!(schema["definitions"]["open"]["additionalProperties"], true);
        assert!(schema["definitions"]["patterned"].get("additionalProperties").is_none());
    }

    #[test]
    fn meta_schemas_are_not_fetched() {
        assert!(is_meta_schema(&Url::parse("http://json-schema.org/draft-07/schema").unwrap()));
        assert!(!is_meta_schema(&Url::parse("https://json.schemastore.org/bower.json").unwrap()));
    }

    #[test]
    fn configure_clears_cache_only_on_change() {
        let svc = service(None);
        svc.compiled
            .lock()
            .insert("file:///x.json".to_string(), Arc::new(OnceCell::new()));
        svc.configure(ServiceOptions::default());
        assert_eq!(svc.compiled.lock().len(), 1);
        svc.configure(ServiceOptions {
            yaml_version: YamlVersion::V1_1,
            disable_additional_properties: false,
        });
        assert!(svc.compiled.lock().is_empty());
    }

    #[test]
    fn unsupported_scheme_fails_registration() {
        let svc = service(None);
        let err = svc
            .register_external_schema("ftp://example.com/s.json", &["*".to_string()])
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedScheme { .. }));
        assert_eq!(svc.schema_count(), 0);
    }

    #[tokio::test]
    async fn validates_and_maps_ranges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("schema.json"),
            r#"{"type":"object","properties":{"count":{"type":"integer"}}}"#,
        )
        .unwrap();
        let svc = service(Some(dir.path().to_path_buf()));
        svc.register_external_schema("schema.json", &["*".to_string()]).unwrap();

        let doc = TextDocument::new("a.yml", "name: x\ncount: many\n");
        let diagnostics = svc.validate(&doc).await;
        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.range.start, Position::new(1, 7));
        assert!(diag.message.contains("integer"), "{}", diag.message);
        assert!(diag.source.as_deref().unwrap().starts_with(SCHEMA_SOURCE_PREFIX));
    }

    #[tokio::test]
    async fn load_failure_becomes_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(Some(dir.path().to_path_buf()));
        svc.register_external_schema("missing.json", &["*".to_string()]).unwrap();

        let doc = TextDocument::new("a.yml", "a: 1\n");
        let diagnostics = svc.validate(&doc).await;
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, Range::document_start());
        assert_eq!(diagnostics[0].source.as_deref(), Some(LOAD_FAILURE_SOURCE));
        assert!(diagnostics[0].message.starts_with("Unable to load schema from '"));
    }
}
