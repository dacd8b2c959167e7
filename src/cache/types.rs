//! Type definitions for improved type safety in the cache module
//!
//! This module provides strongly-typed wrappers for library names and
//! manifest paths so that path handling stays consistent between the
//! tree builder, the query resolver and the installer.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cache::constants::PATH_SEPARATOR;

/// Validate that a library name is safe for use as a single path component
pub fn validate_library_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Library name cannot be empty");
    }

    if name == "." || name.contains("..") || name.contains('/') || name.contains('\\') {
        bail!(
            "Invalid library name '{}': contains path separators or traversal sequences",
            name
        );
    }

    if name.len() > 2 && name.chars().nth(1) == Some(':') {
        bail!("Invalid library name '{}': appears to be an absolute path", name);
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        bail!(
            "Invalid library name '{}': contains invalid characters. Only alphanumeric, underscore, dash and dot are allowed",
            name
        );
    }

    Ok(())
}

/// A normalized, slash-delimited path inside a library
///
/// Empty segments are dropped, so `"intro/"`, `"/intro"` and `"intro"` all
/// address the same node. Zero segments address the library root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// The library root
    pub fn root() -> Self {
        Self::default()
    }

    /// Split a raw path into its non-empty segments
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split(PATH_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if any segment would escape the library directory
    pub fn has_traversal(&self) -> bool {
        self.segments.iter().any(|s| s == ".." || s == ".")
    }

    /// Path of the child named `segment`
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for DocPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for DocPath {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_path_normalization() {
        assert_eq!(DocPath::parse("intro/setup"), DocPath::parse("/intro//setup/"));
        assert_eq!(DocPath::parse("intro/setup").segments(), ["intro", "setup"]);
        assert_eq!(DocPath::parse("intro/setup").to_string(), "intro/setup");
        assert_eq!(DocPath::parse("intro/setup").name(), Some("setup"));
    }

    #[test]
    fn test_doc_path_root() {
        assert!(DocPath::parse("").is_root());
        assert!(DocPath::parse("/").is_root());
        assert_eq!(DocPath::root().name(), None);
        assert_eq!(DocPath::root().join("intro").to_string(), "intro");
    }

    #[test]
    fn test_doc_path_traversal() {
        assert!(DocPath::parse("../etc").has_traversal());
        assert!(DocPath::parse("a/./b").has_traversal());
        assert!(!DocPath::parse("a/..b").has_traversal());
    }

    #[test]
    fn test_validate_library_name() {
        assert!(validate_library_name("sveltejs_svelte").is_ok());
        assert!(validate_library_name("tokio-rs").is_ok());
        assert!(validate_library_name("d3.js").is_ok());

        assert!(validate_library_name("").is_err());
        assert!(validate_library_name("..").is_err());
        assert!(validate_library_name(".").is_err());
        assert!(validate_library_name("some/path").is_err());
        assert!(validate_library_name("some\\path").is_err());
        assert!(validate_library_name("C:\\Windows").is_err());
        assert!(validate_library_name("lib name").is_err());
        assert!(validate_library_name("lib@2").is_err());
    }
}
