//! # Schema Identifier Resolution
//!
//! Pure functions that turn a schema identifier into a [`SchemaLocation`].
//! An identifier may be:
//!
//! - a relative path (`schemas/app.json`), resolved against the root
//!   directory when one is configured;
//! - an absolute filesystem path (`/srv/schemas/app.json`);
//! - a Windows drive path (`C:\schemas\app.json`), always treated as a
//!   local file whatever its apparent URI scheme;
//! - a `file`, `http` or `https` URI.
//!
//! Any other scheme is rejected with [`SchemaError::UnsupportedScheme`]
//! before anything is fetched. No I/O happens here, apart from reading
//! the process working directory when a relative path has to become a URI.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::SchemaError;

/// Where a schema's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaLocation {
    /// A local file. Relative paths are relative to the process working directory.
    File(PathBuf),
    /// An `http` or `https` URL.
    Remote(Url),
}

impl SchemaLocation {
    /// The canonical URI for this location (`file://` or `http(s)://`).
    pub fn uri(&self) -> Result<Url, SchemaError> {
        match self {
            Self::Remote(url) => Ok(url.clone()),
            Self::File(path) => {
                let text = path.to_string_lossy();
                if is_windows_drive_path(&text) {
                    return windows_path_to_file_url(&text);
                }
                let absolute = if path.is_absolute() {
                    path.clone()
                } else {
                    let cwd = std::env::current_dir().map_err(|e| SchemaError::InvalidIdentifier {
                        identifier: text.to_string(),
                        reason: format!("cannot determine working directory: {e}"),
                    })?;
                    normalize_path(&cwd.join(path))
                };
                Url::from_file_path(&absolute).map_err(|()| SchemaError::InvalidIdentifier {
                    identifier: text.to_string(),
                    reason: "path cannot be expressed as a file URI".to_string(),
                })
            }
        }
    }
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Whether `identifier` looks like `C:\...` or `C:/...`.
pub fn is_windows_drive_path(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// An identifier is relative when it has no URI scheme and is not an
/// absolute filesystem path.
pub fn is_relative_path(identifier: &str) -> bool {
    if identifier.is_empty() || is_windows_drive_path(identifier) {
        return false;
    }
    if identifier.starts_with('/') || identifier.starts_with('\\') {
        return false;
    }
    if Path::new(identifier).is_absolute() {
        return false;
    }
    matches!(
        Url::parse(identifier),
        Err(url::ParseError::RelativeUrlWithoutBase)
    )
}

/// Lexically normalise a path: drop `.` components and fold `..` into
/// the preceding component where possible. The filesystem is not consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Resolve a relative identifier.
///
/// With a root: `root / dirname(referring) / identifier`, or
/// `root / identifier` when there is no referring document. Without a
/// root the identifier is only normalised, which is relative to the
/// process working directory; callers should pass absolute document
/// paths in that case.
pub fn resolve_relative(root: Option<&Path>, identifier: &str, referring: Option<&str>) -> PathBuf {
    let identifier = identifier.replace('\\', "/");
    match root {
        Some(root) => {
            let mut joined = root.to_path_buf();
            if let Some(dir) = referring.and_then(|r| Path::new(r).parent()) {
                joined.push(dir);
            }
            joined.push(identifier);
            normalize_path(&joined)
        }
        None => normalize_path(Path::new(&identifier)),
    }
}

/// Resolve `identifier` against the directory of the referring document.
pub fn resolve_against_document(identifier: &str, referring: &str) -> PathBuf {
    let identifier = identifier.replace('\\', "/");
    let dir = Path::new(referring).parent().unwrap_or_else(|| Path::new(""));
    normalize_path(&dir.join(identifier))
}

/// Convert a Windows drive path into a canonical `file:///C:/...` URI.
pub fn windows_path_to_file_url(identifier: &str) -> Result<Url, SchemaError> {
    let forward = identifier.replace('\\', "/");
    let mut chars = forward.chars();
    let drive = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or_default();
    let rest: String = chars.collect();
    Url::parse(&format!("file:///{drive}{rest}")).map_err(|e| SchemaError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: e.to_string(),
    })
}

/// Convert a `file` URI into a filesystem path.
///
/// A leading separator in front of a drive letter (`/C:/x`) is stripped.
pub fn file_url_to_path(url: &Url) -> Result<PathBuf, SchemaError> {
    let path = url
        .to_file_path()
        .map_err(|()| SchemaError::InvalidIdentifier {
            identifier: url.to_string(),
            reason: "file URI does not name a local path".to_string(),
        })?;
    let text = path.to_string_lossy();
    let trimmed = text.trim_start_matches(['/', '\\']);
    if is_windows_drive_path(trimmed) {
        return Ok(PathBuf::from(canonical_drive_path(trimmed)));
    }
    Ok(path)
}

fn canonical_drive_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let mut chars = forward.chars();
    let drive = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or_default();
    format!("{drive}{}", chars.as_str())
}

/// Resolve an identifier to a location, using `root` for relative paths.
pub fn resolve_identifier(root: Option<&Path>, identifier: &str) -> Result<SchemaLocation, SchemaError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(SchemaError::NoSchemaSpecified);
    }

    if is_windows_drive_path(identifier) {
        return Ok(SchemaLocation::File(PathBuf::from(canonical_drive_path(
            identifier,
        ))));
    }

    if is_relative_path(identifier) {
        return Ok(SchemaLocation::File(resolve_relative(root, identifier, None)));
    }

    if identifier.starts_with('/') || identifier.starts_with('\\') || Path::new(identifier).is_absolute() {
        return Ok(SchemaLocation::File(normalize_path(Path::new(identifier))));
    }

    let url = Url::parse(identifier).map_err(|e| SchemaError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "file" => Ok(SchemaLocation::File(file_url_to_path(&url)?)),
        "http" | "https" => Ok(SchemaLocation::Remote(url)),
        other => Err(SchemaError::UnsupportedScheme {
            identifier: identifier.to_string(),
            scheme: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn relative_identifiers() {
        assert!(is_relative_path("schema.json"));
        assert!(is_relative_path("./schemas/a.json"));
        assert!(is_relative_path("../a.json"));
        assert!(!is_relative_path("/abs/a.json"));
        assert!(!is_relative_path("C:\\schemas\\a.json"));
        assert!(!is_relative_path("https://example.com/a.json"));
        assert!(!is_relative_path("file:///tmp/a.json"));
        assert!(!is_relative_path(""));
    }

    #[test]
    fn drive_paths_are_detected() {
        assert!(is_windows_drive_path("C:\\schemas\\x.json"));
        assert!(is_windows_drive_path("d:/schemas/x.json"));
        assert!(!is_windows_drive_path("C:schemas"));
        assert!(!is_windows_drive_path("https://x"));
    }

    // Location equality only; the Windows fetch test in `fetch.rs` reads
    // through each spelling.
    #[test]
    fn drive_path_spellings_resolve_to_one_location() {
        let a = resolve_identifier(None, "C:\\schemas\\x.json").unwrap();
        let b = resolve_identifier(None, "c:/schemas/x.json").unwrap();
        let c = resolve_identifier(None, "file:///C:/schemas/x.json").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.uri().unwrap().as_str(), "file:///C:/schemas/x.json");
    }

    #[test]
    fn relative_with_root_joins_root() {
        let loc = resolve_identifier(Some(Path::new("/repo")), "schemas/../s.json").unwrap();
        assert_eq!(loc, SchemaLocation::File(PathBuf::from("/repo/s.json")));
    }

    #[test]
    fn relative_without_root_is_normalised_only() {
        let loc = resolve_identifier(None, "./schemas/s.json").unwrap();
        assert_eq!(loc, SchemaLocation::File(PathBuf::from("schemas/s.json")));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_and_file_uri_agree() {
        let a = resolve_identifier(None, "/srv/schemas/s.json").unwrap();
        let b = resolve_identifier(None, "file:///srv/schemas/s.json").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.uri().unwrap().as_str(), "file:///srv/schemas/s.json");
    }

    #[test]
    fn remote_urls_are_kept() {
        let loc = resolve_identifier(None, "HTTPS://json.schemastore.org/bower.json").unwrap();
        match loc {
            SchemaLocation::Remote(url) => {
                assert_eq!(url.scheme(), "https");
                assert_eq!(url.path(), "/bower.json");
            }
            other => panic!("expected remote, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_scheme_fails_fast() {
        let err = resolve_identifier(None, "ftp://example.com/s.json").unwrap_err();
        assert!(
            matches!(err, SchemaError::UnsupportedScheme { ref scheme, .. } if scheme == "ftp"),
            "got {err}"
        );
        assert!(matches!(
            resolve_identifier(None, "urn:example:schema"),
            Err(SchemaError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn empty_identifier_is_rejected() {
        assert!(matches!(
            resolve_identifier(None, "  "),
            Err(SchemaError::NoSchemaSpecified)
        ));
    }

    #[test]
    fn resolve_relative_uses_referring_directory() {
        let p = resolve_relative(Some(Path::new("/repo")), "../schemas/a.json", Some("config/app.yml"));
        assert_eq!(p, PathBuf::from("/repo/schemas/a.json"));

        let p = resolve_against_document("a.json", "/data/docs/x.yml");
        assert_eq!(p, PathBuf::from("/data/docs/a.json"));
    }

    #[test]
    fn normalize_handles_parents() {
        assert_eq!(normalize_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(segments in proptest::collection::vec("[a-z]{1,4}|\\.|\\.\\.", 0..8)) {
            let path = PathBuf::from(segments.join("/"));
            let once = normalize_path(&path);
            let twice = normalize_path(&once);
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.components().skip(1).any(|c| c == Component::CurDir));
        }
    }
}
