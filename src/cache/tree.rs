//! Hierarchical documentation tree built from the flat manifest map

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

use crate::cache::manifest::{DocKind, ManifestEntry, TokenCounts, Usage};
use crate::cache::types::DocPath;
use crate::cache::variants::{MarkdownVariants, Variant};

/// Content and metadata attached to a node that has a manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocItem {
    #[serde(rename = "type")]
    pub kind: DocKind,
    /// Original filesystem path from the manifest, informational only
    pub path: String,
    pub relevant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_counts: Option<TokenCounts>,
    pub markdown: MarkdownVariants,
}

impl DocItem {
    pub fn from_entry(entry: ManifestEntry, markdown: MarkdownVariants) -> Self {
        Self {
            kind: entry.kind,
            path: entry.path,
            relevant: entry.relevant,
            usage: entry.usage,
            token_counts: entry.token_counts,
            markdown,
        }
    }

    /// Item for a library root that has variant files but no manifest entry
    pub fn synthesized_root(markdown: MarkdownVariants) -> Self {
        Self {
            kind: DocKind::Directory,
            path: String::new(),
            relevant: true,
            usage: None,
            token_counts: None,
            markdown,
        }
    }
}

/// One position in a library's tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: DocPath,
    pub children: BTreeMap<String, TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DocItem>,
}

impl TreeNode {
    /// An empty root node
    pub fn root() -> Self {
        Self::default()
    }

    fn child_of(parent: &DocPath, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: parent.join(name),
            children: BTreeMap::new(),
            data: None,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Walk down from this node along `path`
    pub fn find(&self, path: &DocPath) -> Option<&TreeNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    /// Walk down along `path`, creating intermediate nodes without data
    pub fn get_or_create(&mut self, path: &DocPath) -> &mut TreeNode {
        let mut current = self;
        for segment in path.segments() {
            let parent_path = current.path.clone();
            current = current
                .children
                .entry(segment.clone())
                .or_insert_with(|| TreeNode::child_of(&parent_path, segment));
        }
        current
    }

    /// Attach `item` to the node at `path`, creating the chain as needed
    pub fn insert(&mut self, path: &DocPath, item: DocItem) {
        self.get_or_create(path).data = Some(item);
    }

    /// Content of `variant` at this node, if loaded
    pub fn variant(&self, variant: Variant) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|item| item.markdown.get(&variant))
            .map(String::as_str)
    }

    /// Number of nodes in this subtree, this node included
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(TreeNode::node_count).sum::<usize>()
    }
}

/// Build a tree from manifest entries, loading each node's variants with `load`
///
/// Variant loads for all entries (and the root) run concurrently. Insertion
/// only ever adds nodes, so the resulting tree does not depend on the order
/// of `entries`.
pub async fn build_tree<F, Fut>(entries: BTreeMap<DocPath, ManifestEntry>, load: F) -> TreeNode
where
    F: Fn(DocPath) -> Fut,
    Fut: Future<Output = MarkdownVariants>,
{
    let has_root_entry = entries.contains_key(&DocPath::root());

    let loads = entries.into_iter().map(|(path, entry)| {
        let variants = load(path.clone());
        async move { (path, entry, variants.await) }
    });
    let root_variants = async {
        if has_root_entry {
            MarkdownVariants::new()
        } else {
            load(DocPath::root()).await
        }
    };
    let (loaded, root_variants) = futures::join!(join_all(loads), root_variants);

    let mut root = TreeNode::root();
    for (path, entry, markdown) in loaded {
        tracing::debug!(
            "{} -> {} ({:?}) [{}]",
            path,
            entry.path,
            entry.kind,
            markdown
                .keys()
                .map(Variant::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        root.insert(&path, DocItem::from_entry(entry, markdown));
    }

    if !has_root_entry && !root_variants.is_empty() {
        root.data = Some(DocItem::synthesized_root(root_variants));
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    fn entry(path: &str, kind: DocKind) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            relevant: true,
            kind,
            usage: None,
            token_counts: None,
        }
    }

    fn entries(keys: &[&str]) -> BTreeMap<DocPath, ManifestEntry> {
        keys.iter()
            .map(|k| (DocPath::parse(k), entry(k, DocKind::Page)))
            .collect()
    }

    /// Loader that gives every node a digest naming its path
    fn digest_loader(path: DocPath) -> std::future::Ready<MarkdownVariants> {
        let mut variants = MarkdownVariants::new();
        if !path.is_root() {
            variants.insert(Variant::Digest, format!("digest of {path}"));
        }
        ready(variants)
    }

    #[tokio::test]
    async fn test_build_two_level_tree() {
        let root = build_tree(entries(&["intro", "intro/setup"]), digest_loader).await;

        assert_eq!(root.children.len(), 1);
        assert!(root.data.is_none());

        let intro = &root.children["intro"];
        assert_eq!(intro.name, "intro");
        assert_eq!(intro.path.to_string(), "intro");
        assert_eq!(intro.variant(Variant::Digest), Some("digest of intro"));

        let setup = &intro.children["setup"];
        assert_eq!(setup.path.to_string(), "intro/setup");
        assert!(!setup.has_children());
        assert_eq!(root.node_count(), 3);
    }

    #[tokio::test]
    async fn test_intermediate_nodes_have_no_data() {
        let root = build_tree(entries(&["guide/advanced/caching"]), digest_loader).await;

        let guide = root.find(&DocPath::parse("guide")).unwrap();
        assert!(guide.data.is_none());
        let advanced = root.find(&DocPath::parse("guide/advanced")).unwrap();
        assert!(advanced.data.is_none());
        let caching = root.find(&DocPath::parse("guide/advanced/caching")).unwrap();
        assert!(caching.data.is_some());
    }

    #[tokio::test]
    async fn test_child_inserted_before_parent_keeps_parent_data() {
        let mut root = TreeNode::root();
        let item = |p: &str| DocItem::from_entry(entry(p, DocKind::Directory), MarkdownVariants::new());

        root.insert(&DocPath::parse("a/b"), item("a/b"));
        root.insert(&DocPath::parse("a"), item("a"));

        let a = root.find(&DocPath::parse("a")).unwrap();
        assert_eq!(a.data.as_ref().map(|d| d.path.as_str()), Some("a"));
        assert!(a.children.contains_key("b"));
    }

    #[tokio::test]
    async fn test_insertion_order_does_not_matter() {
        let keys = ["a/b/c", "a", "x", "a/b", "x/y", "a/d"];
        let item = |p: &DocPath| {
            let mut markdown = MarkdownVariants::new();
            markdown.insert(Variant::Essence, p.to_string());
            DocItem::from_entry(entry(&p.to_string(), DocKind::Page), markdown)
        };

        let mut forward = TreeNode::root();
        for key in keys {
            let path = DocPath::parse(key);
            forward.insert(&path, item(&path));
        }

        let mut backward = TreeNode::root();
        for key in keys.iter().rev() {
            let path = DocPath::parse(key);
            backward.insert(&path, item(&path));
        }

        assert_eq!(forward, backward);
        assert_eq!(forward.node_count(), 7);
    }

    #[tokio::test]
    async fn test_root_variants_attach_synthesized_item() {
        let loader = |path: DocPath| {
            let mut variants = MarkdownVariants::new();
            if path.is_root() {
                variants.insert(Variant::Essence, "library essence".to_string());
            }
            ready(variants)
        };

        let root = build_tree(entries(&["intro"]), loader).await;
        let data = root.data.as_ref().unwrap();
        assert_eq!(data.kind, DocKind::Directory);
        assert_eq!(root.variant(Variant::Essence), Some("library essence"));
    }

    #[tokio::test]
    async fn test_root_manifest_entry_is_used() {
        let mut map = entries(&["intro"]);
        map.insert(DocPath::root(), entry("docs", DocKind::Directory));

        let root = build_tree(map, digest_loader).await;
        let data = root.data.as_ref().unwrap();
        assert_eq!(data.path, "docs");
        assert!(data.markdown.is_empty());
    }

    #[test]
    fn test_find_missing_path() {
        let mut root = TreeNode::root();
        root.get_or_create(&DocPath::parse("a/b"));

        assert!(root.find(&DocPath::parse("a/c")).is_none());
        assert!(root.find(&DocPath::parse("z")).is_none());
        assert_eq!(root.find(&DocPath::root()), Some(&root));
    }
}
