//! # Dependency Order Check
//!
//! Verifies that every dependency table of every `Cargo.toml` in the tree
//! lists its keys in ascending (case-insensitive) order.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

use crate::error::{Error, Result};

const DEPENDENCY_TABLES: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];

/// A key that sorts before the key preceding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderViolation {
    pub manifest: PathBuf,
    pub table: String,
    pub key: String,
    pub previous: String,
}

impl fmt::Display for OrderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}] '{}' should come before '{}'",
            self.manifest.display(),
            self.table,
            self.key,
            self.previous
        )
    }
}

/// Check one manifest file
pub fn check_manifest(path: &Path) -> Result<Vec<OrderViolation>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read manifest {:?}", path), e))?;
    check_manifest_str(&text, path)
}

/// Check manifest contents; `path` labels the violations
pub fn check_manifest_str(text: &str, path: &Path) -> Result<Vec<OrderViolation>> {
    let manifest: Table = text.parse().map_err(|e: toml::de::Error| Error::ManifestParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut violations = Vec::new();
    for (table_name, table) in dependency_tables(&manifest) {
        let keys: Vec<&str> = table.keys().map(String::as_str).collect();
        for pair in keys.windows(2) {
            let (previous, key) = (pair[0], pair[1]);
            if key.to_ascii_lowercase() < previous.to_ascii_lowercase() {
                violations.push(OrderViolation {
                    manifest: path.to_path_buf(),
                    table: table_name.clone(),
                    key: key.to_string(),
                    previous: previous.to_string(),
                });
            }
        }
    }
    Ok(violations)
}

/// Check every `Cargo.toml` under `root`, skipping `target/` and ignored paths
pub fn check_workspace(root: &Path) -> Result<Vec<OrderViolation>> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| entry.file_name() != "target" && entry.file_name() != ".git")
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut violations = Vec::new();
    let mut checked = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::io(
                format!("Failed to walk {:?}", root),
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            )
        })?;
        let path = entry.path();
        if path.is_file() && entry.file_name() == "Cargo.toml" {
            checked += 1;
            violations.extend(check_manifest(path)?);
        }
    }
    tracing::debug!(manifests = checked, violations = violations.len(), "Dependency order checked");
    Ok(violations)
}

fn dependency_tables(manifest: &Table) -> Vec<(String, &Table)> {
    let mut tables = Vec::new();

    for name in DEPENDENCY_TABLES {
        if let Some(Value::Table(t)) = manifest.get(*name) {
            tables.push((name.to_string(), t));
        }
    }

    if let Some(Value::Table(workspace)) = manifest.get("workspace") {
        if let Some(Value::Table(t)) = workspace.get("dependencies") {
            tables.push(("workspace.dependencies".to_string(), t));
        }
    }

    if let Some(Value::Table(targets)) = manifest.get("target") {
        for (cfg, target) in targets {
            if let Value::Table(target) = target {
                for name in DEPENDENCY_TABLES {
                    if let Some(Value::Table(t)) = target.get(*name) {
                        tables.push((format!("target.{}.{}", cfg, name), t));
                    }
                }
            }
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sorted_manifest_passes() {
        let text = r#"
[package]
name = "demo"

[dependencies]
anyhow = "1"
Inflector = "0.11"
serde = { version = "1", features = ["derive"] }
tokio = "1"

[dev-dependencies]
tempfile = "3"
"#;
        let v = check_manifest_str(text, Path::new("Cargo.toml")).unwrap();
        assert!(v.is_empty(), "{:?}", v);
    }

    #[test]
    fn test_unsorted_key_is_reported_with_predecessor() {
        let text = r#"
[dependencies]
serde = "1"
anyhow = "1"
tokio = "1"
"#;
        let v = check_manifest_str(text, Path::new("Cargo.toml")).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].table, "dependencies");
        assert_eq!(v[0].key, "anyhow");
        assert_eq!(v[0].previous, "serde");
        assert_eq!(
            v[0].to_string(),
            "Cargo.toml: [dependencies] 'anyhow' should come before 'serde'"
        );
    }

    #[test]
    fn test_workspace_and_target_tables_are_checked() {
        let text = r#"
[workspace.dependencies]
tokio = "1"
serde = "1"

[target.'cfg(unix)'.dependencies]
nix = "0.29"
libc = "0.2"
"#;
        let v = check_manifest_str(text, Path::new("Cargo.toml")).unwrap();
        let tables: Vec<&str> = v.iter().map(|x| x.table.as_str()).collect();
        assert_eq!(
            tables,
            vec!["workspace.dependencies", "target.cfg(unix).dependencies"]
        );
    }

    #[test]
    fn test_invalid_manifest_is_an_error() {
        let err = check_manifest_str("[dependencies\n", Path::new("bad/Cargo.toml")).unwrap_err();
        assert!(matches!(err, Error::ManifestParse { .. }));
    }

    #[test]
    fn test_workspace_walk_skips_target() {
        let dir = TempDir::new().unwrap();
        let member = dir.path().join("crates").join("core");
        let target = dir.path().join("target").join("package");
        std::fs::create_dir_all(&member).unwrap();
        std::fs::create_dir_all(&target).unwrap();

        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[workspace]\nmembers = [\"crates/core\"]\n",
        )
        .unwrap();
        std::fs::write(member.join("Cargo.toml"), "[dependencies]\nz = \"1\"\na = \"1\"\n").unwrap();
        std::fs::write(target.join("Cargo.toml"), "[dependencies]\ny = \"1\"\nb = \"1\"\n").unwrap();

        let v = check_workspace(dir.path()).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].key, "a");
        assert!(v[0].manifest.starts_with(&member));
    }

    #[test]
    fn test_workspace_walk_honours_gitignore_outside_git() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();

        std::fs::write(dir.path().join(".gitignore"), "scratch/\n").unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[dependencies]\na = \"1\"\n").unwrap();
        std::fs::write(scratch.join("Cargo.toml"), "[dependencies]\nz = \"1\"\na = \"1\"\n").unwrap();

        let v = check_workspace(dir.path()).unwrap();
        assert!(v.is_empty(), "{:?}", v);
    }
}
