//! # YAML Documents With Source Positions
//!
//! A [`TextDocument`] holds the text of one input file. Parsing is lazy
//! and cached: the first call to [`TextDocument::parse`] decides the YAML
//! version used for the rest of the run.
//!
//! Parsing is event-driven (`yaml_rust2::parser::MarkedEventReceiver`).
//! While the JSON value is assembled, every node records the JSON pointer
//! it lives at together with the source range of its key and of its
//! value, so validation errors addressed by instance path can be mapped
//! back to a [`Range`] in the file.
//!
//! Aliases are expanded, `<<` merge keys are applied (explicit keys win)
//! and duplicate keys are reported.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};
use ysv_core::{Diagnostic, Position, Range, YamlVersion};

use crate::scalar::{resolve_plain, resolve_tagged};

/// Diagnostic source for syntax errors and duplicate keys.
pub const YAML_SOURCE: &str = "YAML";

const MODELINE_PREFIX: &str = "yaml-language-server:";

/// One input document: a URI (the path as the caller named it) and its text.
#[derive(Debug)]
pub struct TextDocument {
    uri: String,
    text: String,
    parsed: OnceLock<ParsedYaml>,
}

impl TextDocument {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
            parsed: OnceLock::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the text, or return the cached result of an earlier parse.
    pub fn parse(&self, version: YamlVersion) -> &ParsedYaml {
        self.parsed.get_or_init(|| ParsedYaml::parse(&self.text, version))
    }

    /// The schema named by a `# yaml-language-server: $schema=<id>` comment.
    pub fn schema_modeline(&self) -> Option<&str> {
        self.text.lines().find_map(|line| {
            let comment = line.trim_start().strip_prefix('#')?.trim_start();
            let rest = comment.strip_prefix(MODELINE_PREFIX)?.trim_start();
            let id = rest.strip_prefix("$schema=")?.trim();
            (!id.is_empty()).then_some(id)
        })
    }
}

/// Line lengths in characters, excluding line terminators.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    lengths: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let lengths = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).chars().count() as u32)
            .collect();
        Self { lengths }
    }

    pub fn line_len(&self, line: u32) -> u32 {
        self.lengths.get(line as usize).copied().unwrap_or(0)
    }

    /// A range from `start` spanning `len` characters, clamped to the end
    /// of the start line. Never empty unless the line itself is.
    pub fn span(&self, start: Position, len: u32) -> Range {
        let line_end = self.line_len(start.line).max(start.character);
        let mut end = (start.character + len).min(line_end);
        if end == start.character && line_end > start.character {
            end = start.character + 1;
        }
        Range::new(start, Position::new(start.line, end))
    }

    /// From `start` to the end of its line.
    pub fn rest_of_line(&self, start: Position) -> Range {
        let end = self.line_len(start.line).max(start.character + 1);
        Range::new(start, Position::new(start.line, end))
    }
}

fn position(marker: &Marker) -> Position {
    Position::new(
        marker.line().saturating_sub(1) as u32,
        marker.col() as u32,
    )
}

/// Where one node of the JSON value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpan {
    /// JSON pointer of the node (`""` for the document root).
    pub pointer: String,
    /// Range of the mapping key this node is the value of.
    pub key_range: Option<Range>,
    /// Range of the value. For containers, the first line of the container.
    pub value_range: Range,
    pub is_container: bool,
}

impl NodeSpan {
    /// The range a diagnostic about this node should cover.
    pub fn diagnostic_range(&self) -> Range {
        match (self.is_container, self.key_range) {
            (true, Some(key)) => key,
            _ => self.value_range,
        }
    }

    fn contains(&self, pos: Position) -> bool {
        self.value_range.contains(pos) || self.key_range.is_some_and(|k| k.contains(pos))
    }
}

/// One YAML document of a stream, converted to JSON.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub value: Value,
    pub nodes: Vec<NodeSpan>,
    /// Ranges of keys that repeat an earlier key in the same mapping.
    pub duplicate_keys: Vec<Range>,
}

impl ParsedDocument {
    /// Source range for an instance path, falling back to the nearest
    /// ancestor that has one.
    pub fn range_for_pointer(&self, pointer: &str) -> Range {
        let mut current = pointer;
        loop {
            if let Some(span) = self.nodes.iter().find(|n| n.pointer == current) {
                return span.diagnostic_range();
            }
            match current.rfind('/') {
                Some(idx) => current = &current[..idx],
                None => return Range::document_start(),
            }
        }
    }

    /// The deepest node whose key or value covers `pos`.
    pub fn node_at(&self, pos: Position) -> Option<&NodeSpan> {
        self.nodes
            .iter()
            .filter(|n| n.contains(pos))
            .max_by_key(|n| n.pointer.matches('/').count())
    }
}

/// All documents of a stream plus the first syntax error, if any.
#[derive(Debug, Clone)]
pub struct ParsedYaml {
    pub documents: Vec<ParsedDocument>,
    pub syntax_error: Option<Diagnostic>,
}

impl ParsedYaml {
    pub fn parse(text: &str, version: YamlVersion) -> Self {
        let lines = LineIndex::new(text);
        let mut builder = TreeBuilder::new(&lines, version);
        let mut parser = Parser::new_from_str(text);
        let syntax_error = parser.load(&mut builder, true).err().map(|err| {
            let start = position(err.marker());
            Diagnostic::error(
                lines.span(start, 1),
                err.info().to_string(),
                Some(YAML_SOURCE.to_string()),
            )
        });
        Self {
            documents: builder.documents,
            syntax_error,
        }
    }

    /// Syntax and duplicate-key diagnostics, in source order.
    pub fn structural_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = self
            .documents
            .iter()
            .flat_map(|doc| doc.duplicate_keys.iter())
            .map(|range| {
                Diagnostic::error(
                    *range,
                    "Map keys must be unique",
                    Some(YAML_SOURCE.to_string()),
                )
            })
            .collect();
        diagnostics.extend(self.syntax_error.iter().cloned());
        diagnostics
    }

    /// The document whose nodes cover `pos`.
    pub fn document_at(&self, pos: Position) -> Option<&ParsedDocument> {
        self.documents
            .iter()
            .find(|doc| doc.node_at(pos).is_some())
    }
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

struct PendingKey {
    name: String,
    range: Range,
    merge: bool,
}

enum FrameKind {
    Sequence(Vec<Value>),
    Mapping {
        map: Map<String, Value>,
        pending: Option<PendingKey>,
        merges: Vec<Value>,
    },
}

struct Frame {
    kind: FrameKind,
    anchor: usize,
    slot: Slot,
    start: Position,
}

/// Where a node that is about to be built will land.
#[derive(Clone)]
struct Slot {
    pointer: Option<String>,
    key_range: Option<Range>,
}

struct Completed {
    value: Value,
    /// Text used when this node ends up as a mapping key.
    key_text: String,
    range: Range,
    merge_marker: bool,
}

struct TreeBuilder<'a> {
    lines: &'a LineIndex,
    version: YamlVersion,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
    nodes: Vec<NodeSpan>,
    duplicate_keys: Vec<Range>,
    documents: Vec<ParsedDocument>,
}

impl<'a> TreeBuilder<'a> {
    fn new(lines: &'a LineIndex, version: YamlVersion) -> Self {
        Self {
            lines,
            version,
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
            nodes: Vec::new(),
            duplicate_keys: Vec::new(),
            documents: Vec::new(),
        }
    }

    fn next_slot(&self) -> Slot {
        let Some(top) = self.stack.last() else {
            return Slot {
                pointer: Some(String::new()),
                key_range: None,
            };
        };
        match &top.kind {
            FrameKind::Sequence(items) => Slot {
                pointer: top
                    .slot
                    .pointer
                    .as_ref()
                    .map(|p| format!("{p}/{}", items.len())),
                key_range: None,
            },
            FrameKind::Mapping {
                pending: Some(key), ..
            } if !key.merge => Slot {
                pointer: top
                    .slot
                    .pointer
                    .as_ref()
                    .map(|p| format!("{p}/{}", escape_pointer_segment(&key.name))),
                key_range: Some(key.range),
            },
            FrameKind::Mapping { .. } => Slot {
                pointer: None,
                key_range: None,
            },
        }
    }

    fn record(&mut self, slot: Slot, value_range: Range, is_container: bool) {
        if let Some(pointer) = slot.pointer {
            self.nodes.push(NodeSpan {
                pointer,
                key_range: slot.key_range,
                value_range,
                is_container,
            });
        }
    }

    fn complete(&mut self, node: Completed) {
        let Some(top) = self.stack.last_mut() else {
            self.root = Some(node.value);
            return;
        };
        // Block mapping markers sit on the first key's colon, not its start.
        if let FrameKind::Mapping { pending: None, .. } = top.kind {
            top.start = top.start.min(node.range.start);
        }
        match &mut top.kind {
            FrameKind::Sequence(items) => items.push(node.value),
            FrameKind::Mapping {
                map,
                pending,
                merges,
            } => match pending.take() {
                None => {
                    *pending = Some(PendingKey {
                        name: node.key_text,
                        range: node.range,
                        merge: node.merge_marker,
                    });
                }
                Some(key) if key.merge => merges.push(node.value),
                Some(key) => {
                    if map.contains_key(&key.name) {
                        self.duplicate_keys.push(key.range);
                    }
                    map.insert(key.name, node.value);
                }
            },
        }
    }

    fn remember_anchor(&mut self, anchor: usize, value: &Value) {
        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }
    }

    fn on_scalar(&mut self, text: String, style: TScalarStyle, anchor: usize, tag: Option<Tag>, marker: &Marker) {
        let plain = matches!(style, TScalarStyle::Plain);
        let quoted = matches!(style, TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted);
        let value = match (&tag, plain) {
            (Some(tag), _) => resolve_tagged(&text, &tag.handle, &tag.suffix, self.version),
            (None, true) => resolve_plain(&text, self.version),
            (None, false) => Value::String(text.clone()),
        };

        let start = position(marker);
        let len = text.chars().count() as u32 + if quoted { 2 } else { 0 };
        let range = self.lines.span(start, len);
        let slot = self.next_slot();
        self.record(slot, range, false);
        self.remember_anchor(anchor, &value);
        self.complete(Completed {
            value,
            merge_marker: plain && tag.is_none() && text == "<<",
            key_text: text,
            range,
        });
    }

    fn open(&mut self, kind: FrameKind, anchor: usize, marker: &Marker) {
        let slot = self.next_slot();
        self.stack.push(Frame {
            kind,
            anchor,
            slot,
            start: position(marker),
        });
    }

    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let value = match frame.kind {
            FrameKind::Sequence(items) => Value::Array(items),
            FrameKind::Mapping { mut map, merges, .. } => {
                for merged in merges {
                    apply_merge(&mut map, merged);
                }
                Value::Object(map)
            }
        };
        let range = self.lines.rest_of_line(frame.start);
        self.record(frame.slot, range, true);
        self.remember_anchor(frame.anchor, &value);
        let key_text = serde_json::to_string(&value).unwrap_or_default();
        self.complete(Completed {
            value,
            key_text,
            range,
            merge_marker: false,
        });
    }

    fn finish_document(&mut self) {
        self.stack.clear();
        self.anchors.clear();
        let value = self.root.take().unwrap_or(Value::Null);
        self.documents.push(ParsedDocument {
            value,
            nodes: std::mem::take(&mut self.nodes),
            duplicate_keys: std::mem::take(&mut self.duplicate_keys),
        });
    }
}

fn apply_merge(map: &mut Map<String, Value>, merged: Value) {
    match merged {
        Value::Object(source) => {
            for (key, value) in source {
                map.entry(key).or_insert(value);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Value::Object(source) = item {
                    for (key, value) in source {
                        map.entry(key).or_insert(value);
                    }
                }
            }
        }
        _ => {}
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        match ev {
            Event::Nothing | Event::StreamStart | Event::StreamEnd => {}
            Event::DocumentStart => {
                self.root = None;
            }
            Event::DocumentEnd => self.finish_document(),
            Event::Scalar(text, style, anchor, tag) => {
                self.on_scalar(text, style, anchor, tag, &marker);
            }
            Event::SequenceStart(anchor, _tag) => {
                self.open(FrameKind::Sequence(Vec::new()), anchor, &marker);
            }
            Event::MappingStart(anchor, _tag) => {
                self.open(
                    FrameKind::Mapping {
                        map: Map::new(),
                        pending: None,
                        merges: Vec::new(),
                    },
                    anchor,
                    &marker,
                );
            }
            Event::SequenceEnd | Event::MappingEnd => self.close(),
            Event::Alias(id) => {
                let value = self.anchors.get(&id).cloned().unwrap_or(Value::Null);
                let range = self.lines.span(position(&marker), 1);
                let slot = self.next_slot();
                let is_container = value.is_object() || value.is_array();
                self.record(slot, range, is_container);
                let key_text = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                self.complete(Completed {
                    value,
                    key_text,
                    range,
                    merge_marker: false,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> ParsedYaml {
        ParsedYaml::parse(text, YamlVersion::V1_2)
    }

    #[test]
    fn builds_json_value() {
        let parsed = parse("name: app\ncount: 3\ntags: [a, b]\nnested:\n  on: yes\n");
        assert!(parsed.syntax_error.is_none());
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(
            parsed.documents[0].value,
            json!({"name": "app", "count": 3, "tags": ["a", "b"], "nested": {"on": "yes"}})
        );
    }

    #[test]
    fn yaml_1_1_resolves_booleans() {
        let parsed = ParsedYaml::parse("enabled: yes\n", YamlVersion::V1_1);
        assert_eq!(parsed.documents[0].value, json!({"enabled": true}));
    }

    #[test]
    fn scalar_ranges_follow_source() {
        let parsed = parse("name: app\ncount: bar\n");
        let doc = &parsed.documents[0];
        let range = doc.range_for_pointer("/count");
        assert_eq!(range, Range::new(Position::new(1, 7), Position::new(1, 10)));

        let quoted = parse("name: \"app\"\n");
        let range = quoted.documents[0].range_for_pointer("/name");
        assert_eq!(range, Range::new(Position::new(0, 6), Position::new(0, 11)));
    }

    #[test]
    fn container_ranges_use_key() {
        let parsed = parse("outer:\n  inner: 1\nlist:\n  - a\n  - b\n");
        let doc = &parsed.documents[0];
        assert_eq!(
            doc.range_for_pointer("/outer"),
            Range::new(Position::new(0, 0), Position::new(0, 5))
        );
        assert_eq!(
            doc.range_for_pointer("/list/1"),
            Range::new(Position::new(4, 4), Position::new(4, 5))
        );
        assert_eq!(doc.range_for_pointer("").start, Position::new(0, 0));
    }

    #[test]
    fn mapping_ranges_start_at_first_key() {
        let root = |text: &str| parse(text).documents[0].range_for_pointer("");
        assert_eq!(root("count: 12\n"), Range::new(Position::new(0, 0), Position::new(0, 9)));
        assert_eq!(root("name: sprocket\ncount: three\n").start, Position::new(0, 0));
        assert_eq!(root("# c\nname: x\n").start, Position::new(1, 0));
        assert_eq!(root("- a\n- b\n").start, Position::new(0, 0));

        let parsed = parse("- name: x\n  port: 1\n");
        assert_eq!(
            parsed.documents[0].range_for_pointer("/0"),
            Range::new(Position::new(0, 2), Position::new(0, 9))
        );
    }

    #[test]
    fn unknown_pointer_falls_back_to_ancestor() {
        let parsed = parse("outer:\n  inner: 1\n");
        let doc = &parsed.documents[0];
        assert_eq!(doc.range_for_pointer("/outer/missing"), doc.range_for_pointer("/outer"));
    }

    #[test]
    fn pointer_segments_are_escaped() {
        let parsed = parse("\"a/b\": 1\n\"c~d\": 2\n");
        let doc = &parsed.documents[0];
        let pointers: Vec<&str> = doc.nodes.iter().map(|n| n.pointer.as_str()).collect();
        assert!(pointers.contains(&"/a~1b"));
        assert!(pointers.contains(&"/c~0d"));
    }

    #[test]
    fn aliases_and_merge_keys_are_expanded() {
        let text = "base: &base\n  a: 1\n  b: 2\nchild:\n  <<: *base\n  b: 3\ncopy: *base\n";
        let parsed = parse(text);
        assert_eq!(
            parsed.documents[0].value,
            json!({"base": {"a": 1, "b": 2}, "child": {"a": 1, "b": 3}, "copy": {"a": 1, "b": 2}})
        );
        assert!(parsed.documents[0].duplicate_keys.is_empty());
    }

    #[test]
    fn duplicate_keys_are_reported() {
        let parsed = parse("a: 1\nb: 2\na: 3\n");
        let diags = parsed.structural_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Map keys must be unique");
        assert_eq!(diags[0].range.start, Position::new(2, 0));
        assert_eq!(diags[0].source.as_deref(), Some(YAML_SOURCE));
    }

    #[test]
    fn syntax_errors_become_diagnostics() {
        let parsed = parse("a: b: c\n");
        let err = parsed.syntax_error.as_ref().expect("syntax error");
        assert_eq!(err.source.as_deref(), Some(YAML_SOURCE));
        assert!(!err.message.is_empty());
    }

    #[test]
    fn multiple_documents() {
        let parsed = parse("a: 1\n---\nb: 2\n");
        assert_eq!(parsed.documents.len(), 2);
        assert_eq!(parsed.documents[1].value, json!({"b": 2}));
        assert_eq!(
            parsed.documents[1].range_for_pointer("/b").start,
            Position::new(2, 3)
        );
    }

    #[test]
    fn empty_text_has_no_documents_or_a_null_root() {
        let parsed = parse("");
        assert!(parsed.syntax_error.is_none());
        assert!(parsed.documents.iter().all(|d| d.value.is_null()));
    }

    #[test]
    fn node_at_prefers_deepest() {
        let parsed = parse("outer:\n  inner: 1\n");
        let doc = &parsed.documents[0];
        let node = doc.node_at(Position::new(1, 9)).unwrap();
        assert_eq!(node.pointer, "/outer/inner");
        let node = doc.node_at(Position::new(1, 3)).unwrap();
        assert_eq!(node.pointer, "/outer/inner");
        let node = doc.node_at(Position::new(0, 2)).unwrap();
        assert_eq!(node.pointer, "/outer");
    }

    #[test]
    fn modeline_is_detected() {
        let doc = TextDocument::new(
            "a.yml",
            "# yaml-language-server: $schema=../schemas/a.json\nname: x\n",
        );
        assert_eq!(doc.schema_modeline(), Some("../schemas/a.json"));
        assert_eq!(TextDocument::new("b.yml", "# plain\n").schema_modeline(), None);
    }

    #[test]
    fn crlf_lines_are_measured_without_terminator() {
        let index = LineIndex::new("ab\r\ncd\n");
        assert_eq!(index.line_len(0), 2);
        assert_eq!(index.line_len(1), 2);
        assert_eq!(index.line_len(5), 0);
    }
}
