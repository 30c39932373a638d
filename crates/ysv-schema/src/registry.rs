//! # Schema Registry
//!
//! Associates schema identifiers with the document glob patterns they
//! govern, and answers "which schemas apply to this document?".
//!
//! ## Pattern Language
//!
//! Patterns are globs matched against the document path with `/` as the
//! separator. A pattern may match any trailing run of path segments, so
//! `app.yml` matches `config/app.yml` but not `myapp.yml`.
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `*`    | any run of characters inside one segment |
//! | `**`   | any run of characters, across segments |
//! | `?`    | one character other than `/` |
//! | `{a,b}`| either alternative |
//! | `[..]` | a character class (`[!..]` negates) |
//! | `!p`   | exclusion: documents matching `p` are not governed |
//!
//! ## Priorities
//!
//! Each schema has a priority (default 0). When several schemas match a
//! document, only those in the highest matching priority tier apply, in
//! registration order.

use std::collections::HashMap;

use regex::Regex;

use crate::error::SchemaError;
use crate::paths::SchemaLocation;

/// A compiled document pattern.
#[derive(Debug, Clone)]
pub struct FilePattern {
    source: String,
    regex: Regex,
    include: bool,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let (include, body) = match pattern.strip_prefix('!') {
            Some(rest) => (false, rest),
            None => (true, pattern),
        };
        let normalized = normalize_pattern(body);
        let normalized = normalized.trim_start_matches('/');
        if normalized.is_empty() {
            return Err(invalid("pattern is empty".to_string()));
        }
        let alternatives = expand_braces(normalized)
            .iter()
            .map(|alternative| glob_to_regex(alternative))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        let regex = Regex::new(&format!("^(?:.*/)?(?:{})$", alternatives.join("|")))
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            include,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_exclusion(&self) -> bool {
        !self.include
    }

    fn is_match(&self, normalized_path: &str) -> bool {
        self.regex.is_match(normalized_path)
    }
}

/// Characters a backslash escapes inside a pattern.
const GLOB_META: [char; 9] = ['*', '?', '[', ']', '{', '}', ',', '!', '\\'];

/// Forward slashes, no leading `./`.
fn normalize_document_path(path: &str) -> String {
    strip_current_dir(&path.replace('\\', "/"))
}

/// Like [`normalize_document_path`], but a backslash in front of a glob
/// metacharacter stays an escape.
fn normalize_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if GLOB_META.contains(&next) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push('/'),
        }
    }
    strip_current_dir(&out)
}

fn strip_current_dir(path: &str) -> String {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

/// Expand `{a,b}` alternation into one pattern per alternative, left to
/// right. Groups nest. A group without a top-level comma, or without a
/// closing brace, is kept literally. Backslash-escaped characters are
/// never group delimiters.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '{' => {
                if let Some((close, commas)) = brace_group(&chars, i) {
                    if !commas.is_empty() {
                        let prefix: String = chars[..i].iter().collect();
                        let suffix: String = chars[close + 1..].iter().collect();
                        let mut bounds = vec![i];
                        bounds.extend(commas);
                        bounds.push(close);
                        return bounds
                            .windows(2)
                            .flat_map(|w| {
                                let alternative: String = chars[w[0] + 1..w[1]].iter().collect();
                                expand_braces(&format!("{prefix}{alternative}{suffix}"))
                            })
                            .collect();
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    vec![pattern.to_string()]
}

/// Closing index and top-level comma indices of the group opened at `open`.
fn brace_group(chars: &[char], open: usize) -> Option<(usize, Vec<usize>)> {
    let mut depth = 0usize;
    let mut commas = Vec::new();
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, commas));
                }
            }
            ',' if depth == 1 => commas.push(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn escape_char(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0u8; 4]))
}

/// Translate one brace-free glob into a regex body. Nothing but `**`
/// crosses a `/`.
fn glob_to_regex(glob: &str) -> Result<String, String> {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| "pattern ends with an escape".to_string())?;
                out.push_str(&escape_char(*escaped));
                i += 2;
                continue;
            }
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .skip(1)
                    .position(|&ch| ch == ']')
                    .map(|p| i + 2 + p)
                    .ok_or_else(|| "unterminated character class".to_string())?;
                let mut j = i + 1;
                let negated = chars[j] == '!' || chars[j] == '^';
                if negated {
                    j += 1;
                }
                let members = &chars[j..close];
                let mut set = String::new();
                for (k, &ch) in members.iter().enumerate() {
                    let edge_dash = ch == '-' && (k == 0 || k + 1 == members.len());
                    if edge_dash || matches!(ch, '\\' | '[' | ']' | '&' | '~' | '^') {
                        set.push('\\');
                    }
                    set.push(ch);
                }
                if negated {
                    out.push_str(&format!("[^/{set}]"));
                } else {
                    out.push_str(&format!("[{set}&&[^/]]"));
                }
                i = close + 1;
                continue;
            }
            other => out.push_str(&escape_char(other)),
        }
        i += 1;
    }
    Ok(out)
}

/// One registered schema.
#[derive(Debug, Clone)]
pub struct RegisteredSchema {
    /// The identifier exactly as registered.
    pub identifier: String,
    pub location: SchemaLocation,
    pub patterns: Vec<FilePattern>,
}

impl RegisteredSchema {
    /// Whether this schema governs `document_path`.
    ///
    /// At least one inclusion pattern must match and no exclusion may.
    pub fn governs(&self, document_path: &str) -> bool {
        let path = normalize_document_path(document_path);
        let mut included = false;
        for pattern in &self.patterns {
            if pattern.is_match(&path) {
                if pattern.is_exclusion() {
                    return false;
                }
                included = true;
            }
        }
        included
    }
}

/// Ordered set of registered schemas with per-schema priorities.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Vec<RegisteredSchema>,
    priorities: HashMap<String, i32>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identifier` for `patterns`. Registering the same
    /// identifier again replaces its patterns and keeps its position.
    pub fn register(
        &mut self,
        identifier: &str,
        location: SchemaLocation,
        patterns: &[String],
    ) -> Result<(), SchemaError> {
        let compiled = patterns
            .iter()
            .map(|p| FilePattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let entry = RegisteredSchema {
            identifier: identifier.to_string(),
            location,
            patterns: compiled,
        };
        match self.schemas.iter_mut().find(|s| s.identifier == identifier) {
            Some(existing) => *existing = entry,
            None => self.schemas.push(entry),
        }
        Ok(())
    }

    pub fn set_priority(&mut self, identifier: &str, priority: i32) {
        self.priorities.insert(identifier.to_string(), priority);
    }

    pub fn priority(&self, identifier: &str) -> i32 {
        self.priorities.get(identifier).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSchema> {
        self.schemas.iter()
    }

    /// Schemas governing `document_path`, restricted to the highest
    /// matching priority tier, in registration order.
    pub fn matching(&self, document_path: &str) -> Vec<&RegisteredSchema> {
        let matches: Vec<&RegisteredSchema> = self
            .schemas
            .iter()
            .filter(|s| s.governs(document_path))
            .collect();
        let Some(top) = matches.iter().map(|s| self.priority(&s.identifier)).max() else {
            return Vec::new();
        };
        matches
            .into_iter()
            .filter(|s| self.priority(&s.identifier) == top)
            .collect()
    }
}
