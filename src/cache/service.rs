use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::constants::MANIFEST_FILE;
use crate::cache::manifest::{ManifestMetadata, SourceInfo, SourceType, load_index};
use crate::cache::tree::{TreeNode, build_tree};
use crate::cache::variants::{Variant, load_variants, node_dir};

/// A fully loaded documentation library
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub name: String,
    pub metadata: ManifestMetadata,
    pub root: TreeNode,
}

/// Library listing entry, without the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(default)]
    pub ecosystems: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essence: Option<String>,
}

impl Library {
    /// Essence text of the library root
    pub fn essence(&self) -> Option<&str> {
        self.root.variant(Variant::Essence)
    }

    pub fn summary(&self) -> LibrarySummary {
        LibrarySummary {
            name: self.name.clone(),
            source: self.metadata.source.clone(),
            source_type: self.metadata.source_type,
            ecosystems: self.metadata.ecosystems.clone(),
            essence: self.essence().map(str::to_string),
        }
    }
}

/// Registry of every library loaded from a documentation root
///
/// Populated once by [`LibraryCache::scan`] and read-only afterwards; share
/// it behind an `Arc` rather than a lock.
#[derive(Debug, Clone, Default)]
pub struct LibraryCache {
    libraries: BTreeMap<String, Library>,
}

impl LibraryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one library from its directory
    pub async fn load_library(library_dir: &Path, name: &str) -> Result<Library> {
        tracing::debug!("Loading library: {} from {}", name, library_dir.display());

        let manifest = load_index(&library_dir.join(MANIFEST_FILE))
            .await
            .with_context(|| format!("Failed to load manifest for library {name}"))?;
        let (metadata, entries) = manifest.into_parts();
        let entry_count = entries.len();

        let dir = library_dir.to_path_buf();
        let root = build_tree(entries, |path| load_variants(node_dir(&dir, &path))).await;

        tracing::debug!("Loaded {} items for {}", entry_count, name);

        Ok(Library {
            name: name.to_string(),
            metadata,
            root,
        })
    }

    /// Load every immediate subdirectory of `root_dir` that holds a manifest
    ///
    /// A library that fails to load is logged and skipped; it never affects
    /// the others.
    pub async fn scan(root_dir: &Path) -> Self {
        tracing::debug!("Scanning libraries in {}", root_dir.display());

        let candidates = match Self::library_dirs(root_dir).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Failed to scan libraries: {:#}", e);
                return Self::new();
            }
        };

        let loads = candidates.iter().map(|(name, dir)| async move {
            (name, Self::load_library(dir, name).await)
        });

        let mut cache = Self::new();
        for (name, result) in futures::future::join_all(loads).await {
            match result {
                Ok(library) => cache.insert(library),
                Err(e) => tracing::warn!("Failed to load library {}: {:#}", name, e),
            }
        }

        tracing::info!(
            "Loaded {} libraries from {}",
            cache.len(),
            root_dir.display()
        );
        cache
    }

    /// Subdirectories of `root_dir` containing a manifest file
    ///
    /// A read error partway through the listing ends the scan early with the
    /// directories found so far.
    async fn library_dirs(root_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let entries = tokio::fs::read_dir(root_dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", root_dir.display()))?;
        Ok(Self::collect_library_dirs(root_dir, entries).await)
    }

    async fn collect_library_dirs(
        root_dir: &Path,
        mut entries: tokio::fs::ReadDir,
    ) -> Vec<(String, PathBuf)> {
        let mut dirs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "Stopped listing {} after {} libraries: {}",
                        root_dir.display(),
                        dirs.len(),
                        e
                    );
                    break;
                }
            };
            let is_dir = match entry.file_type().await {
                Ok(file_type) => file_type.is_dir(),
                Err(e) => {
                    tracing::warn!("Failed to inspect {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !is_dir {
                continue;
            }

            let path = entry.path();
            if !tokio::fs::try_exists(path.join(MANIFEST_FILE))
                .await
                .unwrap_or(false)
            {
                continue;
            }

            dirs.push((entry.file_name().to_string_lossy().to_string(), path));
        }

        dirs.sort();
        dirs
    }

    /// Register a library, replacing any previous one of the same name
    pub fn insert(&mut self, library: Library) {
        self.libraries.insert(library.name.clone(), library);
    }

    pub fn get(&self, name: &str) -> Option<&Library> {
        let library = self.libraries.get(name);
        tracing::debug!("get({}) -> {}", name, library.is_some());
        library
    }

    /// Summaries of all libraries, sorted by name
    pub fn list(&self) -> Vec<LibrarySummary> {
        self.libraries.values().map(Library::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
