//! Seams between the run orchestrator and the schema machinery.

use async_trait::async_trait;
use ysv_core::{Diagnostic, Explanation, Position};

use crate::document::TextDocument;

/// Produces diagnostics for one document.
///
/// Schema load failures are reported as diagnostics on the document, not
/// as errors, so one broken schema does not hide results for others.
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    async fn validate(&self, document: &TextDocument) -> Vec<Diagnostic>;
}

/// Produces explanatory content for a position in a document.
#[async_trait]
pub trait ExplanationProvider: Send + Sync {
    async fn explain(&self, document: &TextDocument, position: Position) -> Option<Explanation>;
}
