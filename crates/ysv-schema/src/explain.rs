//! Schema descriptions for a document node.
//!
//! Walks a compiled schema along a JSON pointer, following `$ref`,
//! `properties`, `patternProperties`, `additionalProperties`, `items`,
//! `prefixItems` and the `allOf`/`anyOf`/`oneOf` combinators, and renders
//! the title and description found at the end as markdown.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use url::Url;

/// Bound on `$ref` chains and combinator nesting.
const MAX_DEPTH: usize = 32;

/// Title and description of a schema node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Description {
    fn of(node: &Value) -> Option<Self> {
        let text = |key: &str| {
            node.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let found = Self {
            title: text("title"),
            description: text("description"),
        };
        (found.title.is_some() || found.description.is_some()).then_some(found)
    }

    /// `#### title`, the description, then a link to the schema.
    pub fn to_markdown(&self, source: &Url) -> String {
        let mut parts = Vec::new();
        if let Some(title) = &self.title {
            parts.push(format!("#### {title}"));
        }
        if let Some(description) = &self.description {
            parts.push(description.clone());
        }
        let name = source
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map_or_else(|| source.to_string(), str::to_string);
        parts.push(format!("Source: [{name}]({source})"));
        parts.join("\n\n")
    }
}

/// A compiled schema and the external documents it references.
#[derive(Debug, Clone, Copy)]
pub struct SchemaView<'a> {
    pub root: &'a Value,
    pub base: &'a Url,
    pub resources: &'a HashMap<String, Value>,
}

impl<'a> SchemaView<'a> {
    /// Describe the schema node governing the instance at `pointer`.
    pub fn describe(&self, pointer: &str) -> Option<Description> {
        let mut node = self.root;
        let mut base = self.base.clone();
        for segment in pointer.split('/').skip(1) {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            let (next, next_base) = self.child(node, base, &segment, 0)?;
            node = next;
            base = next_base;
        }
        if let Some(found) = Description::of(node) {
            return Some(found);
        }
        let (target, _) = self.deref(node, base);
        Description::of(target)
    }

    fn lookup(&self, document: &Url) -> Option<&'a Value> {
        let mut own = self.base.clone();
        own.set_fragment(None);
        if own == *document {
            return Some(self.root);
        }
        self.resources.get(document.as_str())
    }

    fn resolve_ref(&self, node: &'a Value, base: &Url) -> Option<(&'a Value, Url)> {
        let reference = node.get("$ref")?.as_str()?;
        let target = base.join(reference).ok()?;
        let fragment = target.fragment().unwrap_or_default().to_string();
        let mut document = target;
        document.set_fragment(None);
        let doc = self.lookup(&document)?;
        let resolved = if fragment.is_empty() {
            doc
        } else {
            doc.pointer(&fragment)?
        };
        Some((resolved, document))
    }

    fn deref(&self, mut node: &'a Value, mut base: Url) -> (&'a Value, Url) {
        for _ in 0..MAX_DEPTH {
            match self.resolve_ref(node, &base) {
                Some((next, next_base)) => {
                    node = next;
                    base = next_base;
                }
                None => break,
            }
        }
        (node, base)
    }

    fn child(&self, node: &'a Value, base: Url, segment: &str, depth: usize) -> Option<(&'a Value, Url)> {
        if depth > MAX_DEPTH {
            return None;
        }
        let (node, base) = self.deref(node, base);
        if let Some(found) = direct_child(node, segment) {
            return Some((found, base));
        }
        for combinator in ["allOf", "anyOf", "oneOf"] {
            let Some(branches) = node.get(combinator).and_then(Value::as_array) else {
                continue;
            };
            for branch in branches {
                if let Some(found) = self.child(branch, base.clone(), segment, depth + 1) {
                    return Some(found);
                }
            }
        }
        None
    }
}

fn direct_child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    if let Some(found) = node.get("properties").and_then(|p| p.get(segment)) {
        return Some(found);
    }
    if let Some(patterns) = node.get("patternProperties").and_then(Value::as_object) {
        let matched = patterns.iter().find(|(pattern, _)| {
            Regex::new(pattern).is_ok_and(|re| re.is_match(segment))
        });
        if let Some((_, schema)) = matched {
            return Some(schema);
        }
    }
    if let Ok(index) = segment.parse::<usize>() {
        if let Some(found) = node
            .get("prefixItems")
            .and_then(|p| p.get(index))
            .or_else(|| node.get("items").and_then(Value::as_array).and_then(|a| a.get(index)))
        {
            return Some(found);
        }
        if let Some(items) = node.get("items").filter(|i| i.is_object()) {
            return Some(items);
        }
        if let Some(extra) = node.get("additionalItems").filter(|i| i.is_object()) {
            return Some(extra);
        }
    }
    node.get("additionalProperties").filter(|a| a.is_object())
}
