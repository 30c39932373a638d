//! # Validation Orchestrator
//!
//! Drives one run: every document is read and validated concurrently, each
//! diagnostic is paired with the explanation at its start position, and
//! results come back in input order with passing documents dropped.
//!
//! The orchestrator only talks to the engine through [`ValidationEngine`]
//! and [`ExplanationProvider`], so tests can substitute a scripted engine.

use futures::future::join_all;
use ysv_core::{
    Diagnostic, ErrorEntry, FileValidationResult, Range, UnreadableDocumentPolicy,
};
use ysv_schema::service::LOAD_FAILURE_SOURCE;
use ysv_schema::{
    ExplanationProvider, FetchConfig, SchemaFetcher, SchemaService, ServiceOptions, TextDocument,
    ValidationEngine,
};

use crate::error::ValidateError;
use crate::settings::ResolvedSettings;

/// Build a schema service for a run and register the run's mapping.
///
/// Every mapped schema gets the top priority, in mapping order.
pub fn build_service(
    settings: &ResolvedSettings,
    fetch: &FetchConfig,
) -> Result<SchemaService, ValidateError> {
    let fetcher = SchemaFetcher::new(settings.root_dir.clone(), fetch)?;
    let service = SchemaService::new(fetcher, settings.workspace.clone());
    service.configure(ServiceOptions {
        yaml_version: settings.base.yaml_version(),
        disable_additional_properties: settings.base.disable_additional_properties,
    });

    for (schema, patterns) in settings.schema_mapping.iter() {
        service.add_schema_priority(schema, 0);
        service.register_external_schema(schema, patterns)?;
        tracing::debug!(schema, patterns = ?patterns, "registered schema");
    }
    Ok(service)
}

/// Runs documents through an engine.
#[derive(Debug)]
pub struct Orchestrator<E> {
    engine: E,
    settings: ResolvedSettings,
}

impl<E> Orchestrator<E>
where
    E: ValidationEngine + ExplanationProvider,
{
    pub fn new(engine: E, settings: ResolvedSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Validate `documents` (paths relative to the root, if any).
    ///
    /// The output holds one entry per failing document, in input order.
    /// Under [`UnreadableDocumentPolicy::Abort`] the first unreadable
    /// document in input order fails the run.
    pub async fn run(&self, documents: &[String]) -> Result<Vec<FileValidationResult>, ValidateError> {
        tracing::info!(files = documents.len(), "validating YAML files");

        let outcomes = join_all(documents.iter().map(|doc| self.validate_document(doc))).await;

        let mut results = Vec::new();
        for outcome in outcomes {
            let result = outcome?;
            if !result.passed() {
                results.push(result);
            }
        }

        tracing::info!(
            files = documents.len(),
            failed = results.len(),
            errors = results.iter().map(|r| r.errors.len()).sum::<usize>(),
            "validation finished"
        );
        Ok(results)
    }

    async fn validate_document(&self, document: &str) -> Result<FileValidationResult, ValidateError> {
        let path = self.settings.document_path(document);
        let file_path = path.to_string_lossy().into_owned();

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(source) => match self.settings.base.on_unreadable_document {
                UnreadableDocumentPolicy::Abort => {
                    return Err(ValidateError::DocumentRead { path, source });
                }
                UnreadableDocumentPolicy::Report => {
                    tracing::warn!(path = %file_path, error = %source, "document unreadable");
                    let diagnostic = Diagnostic::error(
                        Range::document_start(),
                        format!("Unable to read document: {source}"),
                        Some(LOAD_FAILURE_SOURCE.to_string()),
                    );
                    return Ok(FileValidationResult {
                        file_path,
                        errors: vec![ErrorEntry {
                            diagnostic,
                            explanation: None,
                        }],
                    });
                }
            },
        };

        let doc = TextDocument::new(document, text);
        let diagnostics = self.engine.validate(&doc).await;
        let explanations = join_all(
            diagnostics
                .iter()
                .map(|diag| self.engine.explain(&doc, diag.range.start)),
        )
        .await;

        if !diagnostics.is_empty() {
            tracing::debug!(path = %file_path, count = diagnostics.len(), "document failed validation");
        }

        let errors = diagnostics
            .into_iter()
            .zip(explanations)
            .map(|(diagnostic, explanation)| ErrorEntry {
                diagnostic,
                explanation,
            })
            .collect();
        Ok(FileValidationResult { file_path, errors })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use ysv_core::{BaseSettings, Explanation, Position};

    use super::*;

    /// Fails every document whose text contains `bad`, one diagnostic per
    /// matching line. Documents named `slow*` take longer to validate.
    #[derive(Debug, Default)]
    struct ScriptedEngine {
        explained: AtomicUsize,
    }

    #[async_trait]
    impl ValidationEngine for ScriptedEngine {
        async fn validate(&self, document: &TextDocument) -> Vec<Diagnostic> {
            if document.uri().starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            document
                .text()
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains("bad"))
                .map(|(i, line)| {
                    let start = Position::new(i as u32, 0);
                    let end = Position::new(i as u32, line.chars().count() as u32);
                    Diagnostic::error(Range::new(start, end), "bad value", Some("test".into()))
                })
                .collect()
        }
    }

    #[async_trait]
    impl ExplanationProvider for ScriptedEngine {
        async fn explain(&self, _document: &TextDocument, position: Position) -> Option<Explanation> {
            self.explained.fetch_add(1, Ordering::SeqCst);
            (position.line == 0).then(|| Explanation {
                contents: "first line".into(),
                range: None,
            })
        }
    }

    fn write(root: &Path, name: &str, text: &str) {
        std::fs::write(root.join(name), text).unwrap();
    }

    fn rooted(root: &Path, policy: UnreadableDocumentPolicy) -> ResolvedSettings {
        ResolvedSettings {
            root_dir: Some(root.to_path_buf()),
            base: BaseSettings {
                on_unreadable_document: policy,
                ..BaseSettings::default()
            },
            ..ResolvedSettings::default()
        }
    }

    fn names(results: &[FileValidationResult], root: &Path) -> Vec<String> {
        results
            .iter()
            .map(|r| {
                Path::new(&r.file_path)
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[tokio::test]
    async fn results_follow_input_order_and_skip_passing_documents() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "slow-a.yml", "bad: 1\n");
        write(dir.path(), "b.yml", "good: 1\n");
        write(dir.path(), "c.yml", "ok: 1\nbad: 2\nbad: 3\n");

        let orchestrator = Orchestrator::new(
            ScriptedEngine::default(),
            rooted(dir.path(), UnreadableDocumentPolicy::Abort),
        );
        let docs = vec!["slow-a.yml".to_string(), "b.yml".to_string(), "c.yml".to_string()];
        let results = orchestrator.run(&docs).await.unwrap();

        assert_eq!(names(&results, dir.path()), vec!["slow-a.yml", "c.yml"]);
        assert_eq!(results[0].errors.len(), 1);
        assert_eq!(results[1].errors.len(), 2);
        assert_eq!(orchestrator.engine().explained.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn explanations_are_paired_with_their_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", "bad: 1\nbad: 2\n");

        let orchestrator = Orchestrator::new(
            ScriptedEngine::default(),
            rooted(dir.path(), UnreadableDocumentPolicy::Abort),
        );
        let results = orchestrator.run(&["a.yml".to_string()]).await.unwrap();
        let errors = &results[0].errors;
        assert_eq!(errors[0].explanation.as_ref().unwrap().contents, "first line");
        assert!(errors[1].explanation.is_none());
        assert_eq!(errors[1].diagnostic.range.start, Position::new(1, 0));
    }

    #[tokio::test]
    async fn unreadable_document_aborts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", "bad: 1\n");

        let orchestrator = Orchestrator::new(
            ScriptedEngine::default(),
            rooted(dir.path(), UnreadableDocumentPolicy::Abort),
        );
        let docs = vec!["a.yml".to_string(), "missing-1.yml".to_string(), "missing-2.yml".to_string()];
        let err = orchestrator.run(&docs).await.unwrap_err();
        match err {
            ValidateError::DocumentRead { path, .. } => {
                assert!(path.ends_with("missing-1.yml"), "{}", path.display());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreadable_document_can_be_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", "good: 1\n");

        let orchestrator = Orchestrator::new(
            ScriptedEngine::default(),
            rooted(dir.path(), UnreadableDocumentPolicy::Report),
        );
        let docs = vec!["missing.yml".to_string(), "a.yml".to_string()];
        let results = orchestrator.run(&docs).await.unwrap();

        assert_eq!(names(&results, dir.path()), vec!["missing.yml"]);
        let entry = &results[0].errors[0];
        assert_eq!(entry.diagnostic.range, Range::document_start());
        assert_eq!(entry.diagnostic.source.as_deref(), Some(LOAD_FAILURE_SOURCE));
        assert!(entry.explanation.is_none());
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let orchestrator = Orchestrator::new(ScriptedEngine::default(), ResolvedSettings::default());
        assert!(orchestrator.run(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn build_service_registers_every_mapped_schema() {
        let mut mapping = ysv_core::SchemaMapping::new();
        mapping.insert("a.json", vec!["a.yml".into()]);
        mapping.insert("https://example.com/b.json", vec!["*.yml".into(), "!skip.yml".into()]);
        let settings = ResolvedSettings {
            schema_mapping: mapping,
            ..ResolvedSettings::default()
        };
        let service = build_service(&settings, &FetchConfig::default()).unwrap();
        assert_eq!(service.schema_count(), 2);
    }

    #[tokio::test]
    async fn build_service_rejects_unsupported_schemes() {
        let settings = ResolvedSettings {
            schema_mapping: ysv_core::SchemaMapping::single("ftp://example.com/s.json", "*"),
            ..ResolvedSettings::default()
        };
        let err = build_service(&settings, &FetchConfig::default()).unwrap_err();
        assert!(matches!(err, ValidateError::Schema(_)), "{err}");
    }
}
