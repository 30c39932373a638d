//! # Validation Settings
//!
//! A validation run is configured by exactly one [`Settings`] variant:
//!
//! - [`Settings::Root`]: directory-rooted mode. Documents are resolved
//!   against `root_dir`; the schema mapping is either supplied or
//!   discovered from `<root_dir>/.vscode/settings.json`.
//! - [`Settings::Schema`]: schema-direct mode. One schema applies to
//!   every input document.
//!
//! Loosely-typed input (e.g. JSON handed over by a CI runner) enters
//! through [`RawSettings`], which applies the precedence rule explicitly:
//! a root directory wins over an explicit schema when both are present.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// YAML language version used for scalar resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum YamlVersion {
    #[serde(rename = "1.1")]
    V1_1,
    #[default]
    #[serde(rename = "1.2")]
    V1_2,
}

impl FromStr for YamlVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1" => Ok(Self::V1_1),
            "1.2" => Ok(Self::V1_2),
            other => Err(ConfigError::UnsupportedYamlVersion(other.to_string())),
        }
    }
}

impl fmt::Display for YamlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1_1 => f.write_str("1.1"),
            Self::V1_2 => f.write_str("1.2"),
        }
    }
}

/// What to do when an input document cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreadableDocumentPolicy {
    /// Fail the whole run with the first read error (in input order).
    #[default]
    Abort,
    /// Record the failure as an error diagnostic on that document.
    Report,
}

/// Settings shared by both validation modes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseSettings {
    /// YAML version; `1.2` when unspecified.
    #[serde(default)]
    pub yaml_version: Option<YamlVersion>,
    /// Treat object schemas without `additionalProperties` as closed.
    #[serde(default)]
    pub disable_additional_properties: bool,
    #[serde(default)]
    pub on_unreadable_document: UnreadableDocumentPolicy,
}

impl BaseSettings {
    /// The effective YAML version.
    pub fn yaml_version(&self) -> YamlVersion {
        self.yaml_version.unwrap_or_default()
    }
}

/// Directory-rooted mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSettings {
    pub root_dir: PathBuf,
    /// Explicit mapping; `None` falls back to the editor configuration file.
    pub schema_mapping: Option<SchemaMapping>,
    pub base: BaseSettings,
}

/// Schema-direct mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSettings {
    /// Schema path or URI applied to every document.
    pub schema: String,
    pub base: BaseSettings,
}

/// The settings union for one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settings {
    Root(RootSettings),
    Schema(SchemaSettings),
}

impl Settings {
    /// Settings shared by both modes.
    pub fn base(&self) -> &BaseSettings {
        match self {
            Self::Root(s) => &s.base,
            Self::Schema(s) => &s.base,
        }
    }
}

/// Untyped settings as received from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub schema_mapping: Option<SchemaMapping>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(flatten)]
    pub base: BaseSettings,
}

impl RawSettings {
    /// Convert into the settings union.
    ///
    /// `rootDir` takes precedence over `schema`. Returns `None` when
    /// neither is present.
    pub fn into_settings(self) -> Option<Settings> {
        match (self.root_dir, self.schema) {
            (Some(root_dir), schema) => {
                if let Some(schema) = schema {
                    tracing::warn!(
                        root_dir = %root_dir.display(),
                        schema = %schema,
                        "both rootDir and schema given; using directory-rooted mode"
                    );
                }
                Some(Settings::Root(RootSettings {
                    root_dir,
                    schema_mapping: self.schema_mapping,
                    base: self.base,
                }))
            }
            (None, Some(schema)) => Some(Settings::Schema(SchemaSettings {
                schema,
                base: self.base,
            })),
            (None, None) => None,
        }
    }
}

/// Ordered table from schema identifier to the glob patterns it governs.
///
/// Insertion order is preserved. Inserting an identifier that is already
/// present replaces its patterns but keeps its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMapping {
    entries: Vec<(String, Vec<String>)>,
}

impl SchemaMapping {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// A one-entry mapping.
    pub fn single(schema: impl Into<String>, pattern: impl Into<String>) -> Self {
        let mut mapping = Self::new();
        mapping.insert(schema, vec![pattern.into()]);
        mapping
    }

    /// Add or replace the patterns for `schema`.
    pub fn insert(&mut self, schema: impl Into<String>, patterns: Vec<String>) {
        let schema = schema.into();
        match self.entries.iter_mut().find(|(id, _)| *id == schema) {
            Some((_, existing)) => *existing = patterns,
            None => self.entries.push((schema, patterns)),
        }
    }

    /// Patterns registered for `schema`.
    pub fn get(&self, schema: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(id, _)| id == schema)
            .map(|(_, p)| p.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(id, patterns)| (id.as_str(), patterns.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a mapping given as a JSON object string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidSchemaMapping(e.to_string()))
    }
}

/// A single pattern is shorthand for a one-element list.
#[derive(Deserialize)]
#[serde(untagged)]
enum PatternsRepr {
    One(String),
    Many(Vec<String>),
}

impl From<PatternsRepr> for Vec<String> {
    fn from(repr: PatternsRepr) -> Self {
        match repr {
            PatternsRepr::One(p) => vec![p],
            PatternsRepr::Many(ps) => ps,
        }
    }
}

impl<'de> Deserialize<'de> for SchemaMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = SchemaMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping schema identifiers to a pattern or list of patterns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SchemaMapping, A::Error> {
                let mut mapping = SchemaMapping::new();
                while let Some((schema, patterns)) = access.next_entry::<String, PatternsRepr>()? {
                    mapping.insert(schema, patterns.into());
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

impl Serialize for SchemaMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (schema, patterns) in &self.entries {
            map.serialize_entry(schema, patterns)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_accepts_string_or_list_and_keeps_order() {
        let mapping = SchemaMapping::from_json_str(
            r#"{"z.json": "a.yml", "a.json": ["b.yml", "c.yml"], "m.json": []}"#,
        )
        .unwrap();
        let ids: Vec<&str> = mapping.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["z.json", "a.json", "m.json"]);
        assert_eq!(mapping.get("z.json").unwrap(), ["a.yml".to_string()]);
        assert_eq!(mapping.get("a.json").unwrap().len(), 2);
        assert!(mapping.get("m.json").unwrap().is_empty());
    }

    #[test]
    fn duplicate_key_keeps_position_and_last_patterns() {
        let mapping =
            SchemaMapping::from_json_str(r#"{"a.json": "one.yml", "b.json": "x.yml", "a.json": "two.yml"}"#)
                .unwrap();
        assert_eq!(mapping.len(), 2);
        let first = mapping.iter().next().unwrap();
        assert_eq!(first.0, "a.json");
        assert_eq!(first.1, ["two.yml".to_string()]);
    }

    #[test]
    fn mapping_rejects_non_string_patterns() {
        let err = SchemaMapping::from_json_str(r#"{"a.json": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchemaMapping(_)));
    }

    #[test]
    fn mapping_serializes_back_to_lists() {
        let mapping = SchemaMapping::single("s.json", "*");
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"s.json":["*"]}"#);
    }

    #[test]
    fn yaml_version_parses_and_defaults() {
        assert_eq!("1.1".parse::<YamlVersion>().unwrap(), YamlVersion::V1_1);
        assert_eq!(" 1.2 ".parse::<YamlVersion>().unwrap(), YamlVersion::V1_2);
        assert!("2.0".parse::<YamlVersion>().is_err());
        assert_eq!(BaseSettings::default().yaml_version(), YamlVersion::V1_2);
    }

    #[test]
    fn raw_settings_root_dir_takes_precedence() {
        let raw: RawSettings = serde_json::from_str(
            r#"{"rootDir": "/repo", "schema": "s.json", "yamlVersion": "1.1"}"#,
        )
        .unwrap();
        match raw.into_settings() {
            Some(Settings::Root(root)) => {
                assert_eq!(root.root_dir, PathBuf::from("/repo"));
                assert_eq!(root.base.yaml_version(), YamlVersion::V1_1);
                assert!(root.schema_mapping.is_none());
            }
            other => panic!("expected root settings, got {other:?}"),
        }
    }

    #[test]
    fn raw_settings_schema_mode_and_empty() {
        let raw: RawSettings = serde_json::from_str(r#"{"schema": "https://x/s.json"}"#).unwrap();
        assert!(matches!(raw.into_settings(), Some(Settings::Schema(s)) if s.schema == "https://x/s.json"));

        let raw: RawSettings = serde_json::from_str("{}").unwrap();
        assert!(raw.into_settings().is_none());
    }

    #[test]
    fn raw_settings_reads_policy() {
        let raw: RawSettings =
            serde_json::from_str(r#"{"schema": "s.json", "onUnreadableDocument": "report"}"#).unwrap();
        let settings = raw.into_settings().unwrap();
        assert_eq!(
            settings.base().on_unreadable_document,
            UnreadableDocumentPolicy::Report
        );
    }
}
