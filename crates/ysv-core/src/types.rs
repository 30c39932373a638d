//! Diagnostic and result types.
//!
//! A validation run produces, for every document that failed, a
//! [`FileValidationResult`] pairing each [`Diagnostic`] with the optional
//! [`Explanation`] found at the diagnostic's start position. Results are
//! created fresh per run and are not mutated after construction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A zero-based position in a text document.
///
/// `character` counts Unicode scalar values from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based character offset within the line.
    pub character: u32,
}

impl Position {
    /// Create a new position.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then(self.character.cmp(&other.character))
    }
}

/// A half-open range `[start, end)` in a text document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Range {
    /// Inclusive start.
    pub start: Position,
    /// Exclusive end.
    pub end: Position,
}

impl Range {
    /// Create a new range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range covering the first character of the document.
    pub fn document_start() -> Self {
        Self::new(Position::new(0, 0), Position::new(0, 1))
    }

    /// Whether `pos` falls inside this range.
    ///
    /// A zero-width range contains exactly its start position.
    pub fn contains(&self, pos: Position) -> bool {
        if self.start == self.end {
            return pos == self.start;
        }
        self.start <= pos && pos < self.end
    }

    /// Whether the range is zero-width.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Diagnostic severity, numbered as in the language server protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        };
        f.write_str(s)
    }
}

/// A structured validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Where in the document the finding applies.
    pub range: Range,
    /// How serious the finding is.
    pub severity: DiagnosticSeverity,
    /// Human-readable message.
    pub message: String,
    /// Producer label, e.g. `YAML` for syntax errors or
    /// `yaml-schema: <schema>` for schema violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Diagnostic {
    /// Create an error-severity diagnostic.
    pub fn error(range: Range, message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            range,
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.range.start.line + 1,
            self.range.start.character + 1,
            self.message
        )?;
        if let Some(source) = &self.source {
            write!(f, " {source}")?;
        }
        Ok(())
    }
}

/// Supplementary content describing the schema element at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    /// Markdown text.
    pub contents: String,
    /// The document range the content describes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

/// One diagnostic together with its explanatory content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(rename = "diag")]
    pub diagnostic: Diagnostic,
    #[serde(rename = "hover")]
    pub explanation: Option<Explanation>,
}

/// Validation outcome for one document.
///
/// Only failing documents are ever returned to callers, so `errors` is
/// non-empty for every result in a run's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValidationResult {
    /// Path of the document as read from disk.
    pub file_path: String,
    /// Findings in the order the engine reported them.
    #[serde(rename = "error")]
    pub errors: Vec<ErrorEntry>,
}

impl FileValidationResult {
    /// Whether the document produced no findings.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}
