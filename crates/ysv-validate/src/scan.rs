//! Document discovery.
//!
//! [`scan_yaml_files`] lists the YAML files under a root directory;
//! [`expand_patterns`] turns the caller's glob patterns into paths.

use std::path::Path;

use walkdir::{DirEntry, WalkDir};
use ysv_schema::registry::expand_braces;

use crate::error::ValidateError;

/// Extensions treated as YAML documents.
pub const YAML_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YAML_EXTENSIONS.contains(&ext))
}

/// Relative paths (with `/` separators) of every `.yml`/`.yaml` file under
/// `root`, sorted. Hidden files and directories are skipped.
pub fn scan_yaml_files(root: &Path) -> Result<Vec<String>, ValidateError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|source| ValidateError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || !is_yaml(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(parts.join("/"));
    }

    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "scanned for YAML files");
    Ok(files)
}

fn has_glob_syntax(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand glob patterns into file paths, pattern by pattern.
///
/// `{a,b}` groups expand first, the same way schema mapping patterns do.
/// Matches of one pattern come back in the order `glob` yields them, and
/// directories are dropped. A pattern without glob syntax is passed
/// through untouched whether or not the file exists, unless it names a
/// directory. A pattern that matches nothing is logged and skipped.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<String>, ValidateError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let before = files.len();
        for expanded in expand_braces(pattern) {
            if !has_glob_syntax(&expanded) {
                if Path::new(&expanded).is_dir() {
                    tracing::warn!(pattern = %pattern, path = %expanded, "skipping directory");
                } else {
                    files.push(expanded);
                }
                continue;
            }
            let entries = glob::glob(&expanded).map_err(|source| ValidateError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => files.push(path.to_string_lossy().into_owned()),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, path = %e.path().display(), error = %e.error(), "skipping unreadable glob match");
                    }
                }
            }
        }
        if files.len() == before {
            tracing::warn!(pattern = %pattern, "no files matched pattern");
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "a: 1\n").unwrap();
    }

    #[test]
    fn scan_finds_yaml_files_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.yaml");
        touch(dir.path(), "a.yml");
        touch(dir.path(), "nested/c.yml");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), ".hidden.yml");
        touch(dir.path(), ".github/workflows/ci.yml");
        std::fs::create_dir_all(dir.path().join("dir.yml")).unwrap();

        let files = scan_yaml_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.yml", "b.yaml", "nested/c.yml"]);
    }

    #[test]
    fn scan_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_yaml_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ValidateError::Scan { .. }));
    }

    #[test]
    fn patterns_expand_in_order_with_literals_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x/2.yml");
        touch(dir.path(), "x/1.yml");
        touch(dir.path(), "y/3.yaml");
        std::fs::create_dir_all(dir.path().join("x/sub.yml")).unwrap();

        let base = dir.path().to_string_lossy().into_owned();
        let patterns = vec![
            format!("{base}/y/*.yaml"),
            format!("{base}/x/*.yml"),
            format!("{base}/literal.yml"),
        ];
        let files = expand_patterns(&patterns).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.strip_prefix(&base).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["/y/3.yaml", "/x/1.yml", "/x/2.yml", "/literal.yml"]);
    }

    #[test]
    fn brace_groups_expand_before_globbing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x/1.yml");
        touch(dir.path(), "x/2.yaml");
        touch(dir.path(), "x/3.json");

        let base = dir.path().to_string_lossy().into_owned();
        let files = expand_patterns(&[format!("{base}/x/*.{{yml,yaml}}")]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.strip_prefix(&base).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["/x/1.yml", "/x/2.yaml"]);
    }

    #[test]
    fn literal_directories_and_empty_matches_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("configs")).unwrap();
        touch(dir.path(), "a.yml");

        let base = dir.path().to_string_lossy().into_owned();
        let patterns = vec![
            format!("{base}/configs"),
            format!("{base}/nothing/*.yml"),
            format!("{base}/a.yml"),
        ];
        let files = expand_patterns(&patterns).unwrap();
        assert_eq!(files, vec![format!("{base}/a.yml")]);
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        let err = expand_patterns(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, ValidateError::Pattern { .. }));
    }
}
