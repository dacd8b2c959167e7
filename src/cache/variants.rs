//! Markdown variants of a documentation node and their loading from disk

use rmcp::schemars;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cache::types::DocPath;

/// One of the four resolutions a node's content can be generated at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Fulltext,
    Digest,
    ShortDigest,
    Essence,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Fulltext,
        Variant::Digest,
        Variant::ShortDigest,
        Variant::Essence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Fulltext => "fulltext",
            Variant::Digest => "digest",
            Variant::ShortDigest => "short_digest",
            Variant::Essence => "essence",
        }
    }

    /// File name of this variant inside a node directory
    pub fn file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("Unknown variant: {s}"))
    }
}

/// Variant levels that may be requested as page content
///
/// `essence` is only used for listings and is deliberately absent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownLevel {
    Fulltext,
    #[default]
    Digest,
    ShortDigest,
}

impl MarkdownLevel {
    pub const ALL: [MarkdownLevel; 3] = [
        MarkdownLevel::Fulltext,
        MarkdownLevel::Digest,
        MarkdownLevel::ShortDigest,
    ];

    pub fn variant(&self) -> Variant {
        match self {
            MarkdownLevel::Fulltext => Variant::Fulltext,
            MarkdownLevel::Digest => Variant::Digest,
            MarkdownLevel::ShortDigest => Variant::ShortDigest,
        }
    }

    /// Whether a page fetched at this level carries a sub-page listing
    pub fn includes_children(&self) -> bool {
        matches!(self, MarkdownLevel::Digest | MarkdownLevel::Fulltext)
    }

    pub fn as_str(&self) -> &'static str {
        self.variant().as_str()
    }
}

impl fmt::Display for MarkdownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkdownLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarkdownLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = MarkdownLevel::ALL.iter().map(|l| l.as_str()).collect();
                format!("Invalid level: {s}. Must be one of: {}", allowed.join(", "))
            })
    }
}

/// Loaded variant content of one node, keyed by variant
///
/// A missing key means the level is unavailable, not that it is empty.
pub type MarkdownVariants = BTreeMap<Variant, String>;

/// Directory holding the variant files of the node at `path`
pub fn node_dir(library_dir: &Path, path: &DocPath) -> PathBuf {
    path.segments()
        .iter()
        .fold(library_dir.to_path_buf(), |dir, segment| dir.join(segment))
}

/// Read a single variant file, treating unreadable files as absent
async fn load_variant(node_dir: &Path, variant: Variant) -> Option<(Variant, String)> {
    let file_path = node_dir.join(variant.file_name());
    match tokio::fs::read_to_string(&file_path).await {
        Ok(content) => Some((variant, content)),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", file_path.display(), e);
            None
        }
    }
}

/// Load whichever of the four variant files exist in `node_dir`
///
/// All four reads are issued concurrently.
pub async fn load_variants(node_dir: PathBuf) -> MarkdownVariants {
    let reads = Variant::ALL
        .into_iter()
        .map(|variant| load_variant(&node_dir, variant));

    futures::future::join_all(reads)
        .await
        .into_iter()
        .flatten()
        .collect()
}
