//! Loading and validation of a library's `index.json` manifest
//!
//! The manifest is first checked structurally as untyped JSON so that every
//! problem across every entry can be reported at once. Only a manifest that
//! passes validation is deserialized into the typed [`Manifest`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::types::DocPath;

/// Deserialize an informational field, falling back to its default when the
/// value has an unexpected shape
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::debug!("Ignoring malformed informational field: {}", e);
        T::default()
    }))
}

/// Whether a manifest entry is a single page or a directory of pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Page,
    Directory,
}

/// Where the documentation of a library was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Git,
    Web,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// LLM usage recorded by the generation pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "lenient")]
    pub input: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub output: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Token counts of the generated variants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCounts {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fulltext: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub digest: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub short_digest: Option<f64>,
}

/// Raw record for one manifest path, before its variants are loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub relevant: bool,
    #[serde(rename = "type")]
    pub kind: DocKind,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub token_counts: Option<TokenCounts>,
}

/// Library-level fields of the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<SourceInfo>,
    #[serde(default, deserialize_with = "lenient")]
    pub source_type: Option<SourceType>,
    #[serde(default, deserialize_with = "lenient")]
    pub ecosystems: Vec<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// A validated manifest
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub metadata: ManifestMetadata,
    pub map: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Split into library metadata and entries keyed by normalized path
    pub fn into_parts(self) -> (ManifestMetadata, BTreeMap<DocPath, ManifestEntry>) {
        let entries = self
            .map
            .into_iter()
            .map(|(key, entry)| (DocPath::parse(&key), entry))
            .collect();
        (self.metadata, entries)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed index.json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid index.json:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

impl ManifestError {
    /// Validation messages, empty for read and parse failures
    pub fn errors(&self) -> &[String] {
        match self {
            ManifestError::Invalid(errors) => errors.as_slice(),
            _ => &[],
        }
    }
}

/// Check the untyped manifest and collect every problem found
pub fn validate_manifest(data: &Value) -> Vec<String> {
    let Some(map) = data.get("map").and_then(Value::as_object) else {
        return vec![r#"missing or invalid "map" field"#.to_string()];
    };

    let mut errors = Vec::new();
    let mut normalized: BTreeMap<DocPath, Vec<&str>> = BTreeMap::new();

    for (key, value) in map {
        let doc_path = DocPath::parse(key);
        if doc_path.has_traversal() {
            errors.push(format!(
                r#"Entry "{key}": path escapes the library directory"#
            ));
        }
        normalized.entry(doc_path).or_default().push(key.as_str());

        let Some(entry) = value.as_object() else {
            errors.push(format!(r#"Entry "{key}": not an object"#));
            continue;
        };

        if !entry.get("path").is_some_and(Value::is_string) {
            errors.push(format!(r#"Entry "{key}": missing or invalid "path" field"#));
        }
        if !entry.get("relevant").is_some_and(Value::is_boolean) {
            errors.push(format!(
                r#"Entry "{key}": missing or invalid "relevant" field"#
            ));
        }
        match entry.get("type").and_then(Value::as_str) {
            Some("page") | Some("directory") => {}
            _ => errors.push(format!(
                r#"Entry "{key}": missing or invalid "type" field (must be "page" or "directory")"#
            )),
        }
    }

    for (doc_path, keys) in normalized {
        if keys.len() < 2 {
            continue;
        }
        for key in &keys {
            let others: Vec<&str> = keys.iter().copied().filter(|k| k != key).collect();
            errors.push(format!(
                r#"Entry "{key}": collides with {others:?} at path "{doc_path}""#
            ));
        }
    }

    errors
}

/// Parse and validate manifest text
pub fn parse_manifest(content: &str) -> Result<Manifest, ManifestError> {
    let data: Value = serde_json::from_str(content)?;

    let errors = validate_manifest(&data);
    if !errors.is_empty() {
        return Err(ManifestError::Invalid(errors));
    }

    Ok(serde_json::from_value(data)?)
}

/// Read, parse and validate the manifest at `manifest_path`
pub async fn load_index(manifest_path: &Path) -> Result<Manifest, ManifestError> {
    let content = tokio::fs::read_to_string(manifest_path)
        .await
        .map_err(|source| ManifestError::Unreadable {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    parse_manifest(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_manifest() -> Result<()> {
        let manifest = parse_manifest(
            r#"{"map": {
                "intro": {"path": "intro", "relevant": true, "type": "page"},
                "intro/setup": {"path": "docs/intro/setup.md", "relevant": false, "type": "page"}
            }}"#,
        )?;

        assert_eq!(manifest.map.len(), 2);
        assert_eq!(manifest.metadata.source, None);
        assert!(manifest.metadata.ecosystems.is_empty());

        let setup = &manifest.map["intro/setup"];
        assert_eq!(setup.path, "docs/intro/setup.md");
        assert!(!setup.relevant);
        assert_eq!(setup.kind, DocKind::Page);
        Ok(())
    }

    #[test]
    fn test_parse_full_manifest() -> Result<()> {
        let manifest = parse_manifest(
            r#"{
                "source": {"name": "svelte", "repo": "https://github.com/sveltejs/svelte", "doc_dir": "documentation"},
                "source_type": "git",
                "ecosystems": ["svelte", "js"],
                "date": "2025-01-01",
                "map": {
                    "runes": {
                        "path": "runes",
                        "relevant": true,
                        "type": "directory",
                        "usage": {"input": 10, "output": 5, "details": {"model": "x"}},
                        "token_counts": {"digest": 120}
                    }
                }
            }"#,
        )?;

        let (metadata, entries) = manifest.into_parts();
        assert_eq!(metadata.source_type, Some(SourceType::Git));
        assert_eq!(metadata.source.as_ref().map(|s| s.name.as_str()), Some("svelte"));
        assert_eq!(metadata.ecosystems, vec!["svelte", "js"]);

        let runes = &entries[&DocPath::parse("runes")];
        assert_eq!(runes.kind, DocKind::Directory);
        assert_eq!(runes.usage.as_ref().map(|u| u.input), Some(10.0));
        assert_eq!(runes.token_counts.as_ref().and_then(|t| t.digest), Some(120.0));
        Ok(())
    }

    #[test]
    fn test_informational_fields_are_lenient() -> Result<()> {
        let manifest = parse_manifest(
            r#"{
                "source": "not an object",
                "ecosystems": null,
                "date": 20250101,
                "map": {
                    "runes": {
                        "path": "runes",
                        "relevant": true,
                        "type": "page",
                        "usage": {"input": 10.0, "output": 2, "details": null},
                        "token_counts": {"digest": "many", "fulltext": 3.5}
                    },
                    "api": {
                        "path": "api",
                        "relevant": false,
                        "type": "page",
                        "usage": [1, 2]
                    }
                }
            }"#,
        )?;

        let (metadata, entries) = manifest.into_parts();
        assert_eq!(metadata.source, None);
        assert!(metadata.ecosystems.is_empty());
        assert_eq!(metadata.date, None);

        let runes = &entries[&DocPath::parse("runes")];
        let usage = runes.usage.as_ref().unwrap();
        assert_eq!((usage.input, usage.output), (10.0, 2.0));
        let counts = runes.token_counts.as_ref().unwrap();
        assert_eq!(counts.digest, None);
        assert_eq!(counts.fulltext, Some(3.5));

        assert_eq!(entries[&DocPath::parse("api")].usage, None);
        Ok(())
    }

    #[test]
    fn test_empty_map_is_valid() -> Result<()> {
        let manifest = parse_manifest(r#"{"map": {}}"#)?;
        assert!(manifest.map.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_map_is_invalid() {
        let err = parse_manifest(r#"{"source": {"name": "x"}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
        assert!(err.to_string().contains(r#""map""#));

        let err = parse_manifest(r#"{"map": []}"#).unwrap_err();
        assert_eq!(err.errors().len(), 1);
    }

    #[test]
    fn test_non_boolean_relevant_names_entry() {
        let err = parse_manifest(
            r#"{"map": {"guide": {"path": "guide", "relevant": "yes", "type": "page"}}}"#,
        )
        .unwrap_err();

        assert_eq!(
            err.errors(),
            [r#"Entry "guide": missing or invalid "relevant" field"#]
        );
        assert!(err.to_string().starts_with("Invalid index.json:\n"));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let err = parse_manifest(
            r#"{"map": {
                "a": {"relevant": true, "type": "page"},
                "b": {"path": "b", "relevant": 1, "type": "chapter"},
                "c": 42
            }}"#,
        )
        .unwrap_err();

        let errors = err.errors();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains(r#"Entry "a""#) && e.contains("path")));
        assert!(errors.iter().any(|e| e.contains(r#"Entry "b""#) && e.contains("relevant")));
        assert!(errors.iter().any(|e| e.contains(r#"Entry "b""#) && e.contains("type")));
        assert!(errors.iter().any(|e| e.contains(r#"Entry "c": not an object"#)));
    }

    #[test]
    fn test_colliding_keys_are_rejected() {
        let err = parse_manifest(
            r#"{"map": {
                "intro": {"path": "intro", "relevant": true, "type": "page"},
                "intro/": {"path": "intro", "relevant": true, "type": "directory"}
            }}"#,
        )
        .unwrap_err();

        let errors = err.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.contains("collides")));
    }

    #[test]
    fn test_traversal_is_rejected() {
        let err = parse_manifest(
            r#"{"map": {"../secrets": {"path": "x", "relevant": true, "type": "page"}}}"#,
        )
        .unwrap_err();
        assert!(err.errors()[0].contains("escapes"));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_manifest("{not json").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_load_index_from_disk() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"{"map": {"a": {"path": "a", "relevant": true, "type": "page"}}}"#,
        )?;

        let manifest = load_index(&path).await?;
        assert!(manifest.map.contains_key("a"));

        let missing = load_index(&temp_dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(ManifestError::Unreadable { .. })));
        Ok(())
    }
}
