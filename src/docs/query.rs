use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use crate::cache::constants::ANY_ECOSYSTEM;
use crate::cache::tree::TreeNode;
use crate::cache::types::DocPath;
use crate::cache::variants::{MarkdownLevel, Variant};
use crate::cache::{Library, LibraryCache, LibrarySummary};

/// Library summaries keyed by library name
pub type LibraryIndex = BTreeMap<String, LibrarySummary>;

/// Failure of a single query, returned to the caller as a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Library not found: {0}")]
    UnknownLibrary(String),

    #[error("Page not found in {library} at path {path}")]
    PathNotFound { library: String, path: String },

    #[error("Level {level} is not available in {library} at path {path}")]
    LevelUnavailable {
        library: String,
        path: String,
        level: MarkdownLevel,
    },

    #[error("{0}")]
    InvalidLevel(String),
}

/// One entry of a flattened subtree listing
///
/// Serializes as a bare name for leaves, or a single-key map for anything
/// carrying an essence or children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    Name(String),
    Summary {
        name: String,
        essence: Option<String>,
    },
    Nested {
        name: String,
        children: Vec<ListingEntry>,
    },
    NestedSummary {
        name: String,
        essence: Option<String>,
        children: Vec<ListingEntry>,
    },
}

#[derive(Serialize)]
struct VerboseBranch<'a> {
    essence: &'a Option<String>,
    children: &'a [ListingEntry],
}

impl Serialize for ListingEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ListingEntry::Name(name) => serializer.serialize_str(name),
            ListingEntry::Summary { name, essence } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, essence)?;
                map.end()
            }
            ListingEntry::Nested { name, children } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, children)?;
                map.end()
            }
            ListingEntry::NestedSummary {
                name,
                essence,
                children,
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, &VerboseBranch { essence, children })?;
                map.end()
            }
        }
    }
}

/// Flatten the children of `node` into a nested, serializable listing
///
/// Leaves and branches are told apart only by whether they have children;
/// the page/directory kind is not surfaced.
pub fn flatten_listing(node: &TreeNode, verbose: bool) -> Vec<ListingEntry> {
    node.children
        .iter()
        .map(|(key, child)| {
            let name = key.clone();
            let essence = || child.variant(Variant::Essence).map(str::to_string);
            match (child.has_children(), verbose) {
                (false, false) => ListingEntry::Name(name),
                (false, true) => ListingEntry::Summary {
                    name,
                    essence: essence(),
                },
                (true, false) => ListingEntry::Nested {
                    name,
                    children: flatten_listing(child, false),
                },
                (true, true) => ListingEntry::NestedSummary {
                    name,
                    essence: essence(),
                    children: flatten_listing(child, true),
                },
            }
        })
        .collect()
}

/// Index summaries by library name
pub fn index_libraries(summaries: Vec<LibrarySummary>) -> LibraryIndex {
    summaries
        .into_iter()
        .map(|summary| (summary.name.clone(), summary))
        .collect()
}

/// Keep libraries tagged with `ecosystem`; `*` keeps everything
pub fn filter_by_ecosystem(libraries: &LibraryIndex, ecosystem: &str) -> LibraryIndex {
    libraries
        .iter()
        .filter(|(_, lib)| ecosystem == ANY_ECOSYSTEM || lib.ecosystems.iter().any(|e| e == ecosystem))
        .map(|(name, lib)| (name.clone(), lib.clone()))
        .collect()
}

/// Library name to root essence for the libraries in `ecosystem`
pub fn library_index(libraries: &LibraryIndex, ecosystem: &str) -> BTreeMap<String, Option<String>> {
    filter_by_ecosystem(libraries, ecosystem)
        .into_iter()
        .map(|(name, lib)| (name, lib.essence))
        .collect()
}

/// Server-side restriction of which libraries are exposed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryFilterOptions {
    /// Only expose these libraries, if set
    pub libraries: Option<Vec<String>>,
    /// Only expose libraries in one of these ecosystems, if set
    pub ecosystems: Option<Vec<String>>,
}

impl LibraryFilterOptions {
    pub fn allows(&self, summary: &LibrarySummary) -> bool {
        let library_ok = self
            .libraries
            .as_ref()
            .is_none_or(|names| names.contains(&summary.name));
        let ecosystem_ok = self
            .ecosystems
            .as_ref()
            .is_none_or(|allowed| summary.ecosystems.iter().any(|e| allowed.contains(e)));
        library_ok && ecosystem_ok
    }
}

pub fn filter_libraries(libraries: &LibraryIndex, options: &LibraryFilterOptions) -> LibraryIndex {
    libraries
        .iter()
        .filter(|(_, lib)| options.allows(lib))
        .map(|(name, lib)| (name.clone(), lib.clone()))
        .collect()
}

/// Every ecosystem tag used by any library
pub fn ecosystems(libraries: &LibraryIndex) -> BTreeSet<String> {
    libraries
        .values()
        .flat_map(|lib| lib.ecosystems.iter().cloned())
        .collect()
}

pub fn filter_ecosystems(
    ecosystems: BTreeSet<String>,
    options: &LibraryFilterOptions,
) -> BTreeSet<String> {
    match &options.ecosystems {
        Some(allowed) => ecosystems
            .into_iter()
            .filter(|e| allowed.contains(e))
            .collect(),
        None => ecosystems,
    }
}

/// Content of a page plus its local navigation listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    pub text: &'a str,
    pub children: Option<Vec<ListingEntry>>,
}

/// Read-only query interface over a [`LibraryCache`]
#[derive(Debug, Clone, Copy)]
pub struct DocQuery<'a> {
    cache: &'a LibraryCache,
}

impl<'a> DocQuery<'a> {
    pub fn new(cache: &'a LibraryCache) -> Self {
        Self { cache }
    }

    fn library(&self, library: &str) -> Result<&'a Library, QueryError> {
        self.cache
            .get(library)
            .ok_or_else(|| QueryError::UnknownLibrary(library.to_string()))
    }

    /// Subtree rooted at `path`; the empty path is the library root
    ///
    /// The subtree is returned as stored. Relevance is carried on each item
    /// but not used to prune.
    pub fn pruned_subtree(&self, library: &str, path: &str) -> Result<&'a TreeNode, QueryError> {
        let lib = self.library(library)?;
        lib.root
            .find(&DocPath::parse(path))
            .ok_or_else(|| QueryError::PathNotFound {
                library: library.to_string(),
                path: display_path(path),
            })
    }

    /// Content at `path` for `level` (digest when unspecified)
    ///
    /// Levels are never substituted: a missing digest is not-found even when
    /// other variants exist.
    pub fn content_at(
        &self,
        library: &str,
        path: &str,
        level: Option<MarkdownLevel>,
    ) -> Result<&'a str, QueryError> {
        let level = level.unwrap_or_default();
        let node = self.pruned_subtree(library, path)?;
        node.variant(level.variant())
            .ok_or_else(|| QueryError::LevelUnavailable {
                library: library.to_string(),
                path: display_path(path),
                level,
            })
    }

    /// Flattened listing of the whole library
    pub fn page_index(&self, library: &str, verbose: bool) -> Result<Vec<ListingEntry>, QueryError> {
        let lib = self.library(library)?;
        Ok(flatten_listing(&lib.root, verbose))
    }

    /// Page content, with a listing of sub-pages for digest and fulltext
    pub fn get_page(
        &self,
        library: &str,
        page: Option<&str>,
        level: Option<MarkdownLevel>,
    ) -> Result<Page<'a>, QueryError> {
        let path = page.unwrap_or("/");
        let level = level.unwrap_or_default();
        let text = self.content_at(library, path, Some(level))?;

        let children = if level.includes_children() {
            let listing = flatten_listing(self.pruned_subtree(library, path)?, false);
            (!listing.is_empty()).then_some(listing)
        } else {
            None
        };

        Ok(Page { text, children })
    }
}

fn display_path(path: &str) -> String {
    let path = DocPath::parse(path);
    if path.is_root() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
