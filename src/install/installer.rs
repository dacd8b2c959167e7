use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::cache::Library;
use crate::cache::constants::{DIGEST_SUFFIX, FULLTEXT_SUFFIX, LLM_MAP_FILE};
use crate::cache::tree::TreeNode;
use crate::cache::types::validate_library_name;
use crate::cache::variants::Variant;

/// Node of the essence projection used to render `LLM_MAP.md`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssenceNode {
    pub name: String,
    pub essence: Option<String>,
    pub children: Vec<EssenceNode>,
}

impl EssenceNode {
    pub fn from_tree(name: &str, node: &TreeNode) -> Self {
        Self {
            name: name.to_string(),
            essence: node.variant(Variant::Essence).map(str::to_string),
            children: node
                .children
                .iter()
                .map(|(key, child)| EssenceNode::from_tree(key, child))
                .collect(),
        }
    }

    /// Render depth-first as a markdown heading followed by a nested list
    pub fn render(&self) -> String {
        let mut out = format!("# {} Map\n\n", self.name);
        if let Some(essence) = self.essence.as_deref().map(str::trim)
            && !essence.is_empty()
        {
            out.push_str(essence);
            out.push_str("\n\n");
        }
        for child in &self.children {
            child.render_item(1, &mut out);
        }
        out
    }

    fn render_item(&self, indent: usize, out: &mut String) {
        out.push_str(&"  ".repeat(indent));
        out.push_str("- ");
        out.push_str(&self.name);
        if let Some(essence) = self.essence.as_deref().map(str::trim)
            && !essence.is_empty()
        {
            out.push_str(": ");
            out.push_str(&essence.replace('\n', " "));
        }
        out.push('\n');
        for child in &self.children {
            child.render_item(indent + 1, out);
        }
    }
}

/// Summary of a completed install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub files_written: usize,
    pub directories_created: usize,
}

/// Materializes libraries as flat markdown files under a destination root
///
/// Layout for a library `lib`:
///
/// ```text
/// {dest}/lib.md              root digest
/// {dest}/lib.md.fulltext     root fulltext
/// {dest}/lib/LLM_MAP.md      essence map
/// {dest}/lib/{key}.md        digest of each child, recursively
/// {dest}/lib/{key}/          for children that have children
/// ```
#[derive(Debug, Clone)]
pub struct Installer {
    dest: PathBuf,
}

impl Installer {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Directory holding the installed tree of `library`
    pub fn library_dir(&self, library: &str) -> PathBuf {
        self.dest.join(library)
    }

    pub async fn is_installed(&self, library: &str) -> bool {
        tokio::fs::try_exists(self.library_dir(library))
            .await
            .unwrap_or(false)
    }

    pub async fn install(&self, library: &Library) -> Result<InstallReport> {
        validate_library_name(&library.name)?;
        tracing::info!(
            "Installing {} into {}",
            library.name,
            self.dest.display()
        );

        let mut report = InstallReport::default();
        let library_dir = self.library_dir(&library.name);
        ensure_dir(&library_dir, &mut report).await?;

        let map_path = library_dir.join(LLM_MAP_FILE);
        self.write_variants(&library.root, &self.dest, &library.name, &map_path, &mut report)
            .await?;

        let map = EssenceNode::from_tree(&library.name, &library.root).render();
        write_file(&map_path, &map, &mut report).await?;

        let mut pending: Vec<(PathBuf, &TreeNode)> = vec![(library_dir, &library.root)];
        while let Some((dir, node)) = pending.pop() {
            for (key, child) in &node.children {
                if child.path.has_traversal() {
                    bail!("Refusing to install path outside the library: {}", child.path);
                }
                self.write_variants(child, &dir, key, &map_path, &mut report)
                    .await?;
                if child.has_children() {
                    let child_dir = dir.join(key);
                    ensure_dir(&child_dir, &mut report).await?;
                    pending.push((child_dir, child));
                }
            }
        }

        tracing::info!(
            "Installed {}: {} files, {} directories",
            library.name,
            report.files_written,
            report.directories_created
        );
        Ok(report)
    }

    /// Write the digest and fulltext of `node` as `{dir}/{stem}.md[.fulltext]`
    ///
    /// A file that would land on `reserved` is skipped so the essence map
    /// is never overwritten by a page named `LLM_MAP`.
    async fn write_variants(
        &self,
        node: &TreeNode,
        dir: &Path,
        stem: &str,
        reserved: &Path,
        report: &mut InstallReport,
    ) -> Result<()> {
        for (variant, suffix) in [
            (Variant::Digest, DIGEST_SUFFIX),
            (Variant::Fulltext, FULLTEXT_SUFFIX),
        ] {
            let Some(text) = node.variant(variant) else {
                continue;
            };
            let path = dir.join(format!("{stem}{suffix}"));
            if path == reserved {
                tracing::warn!(
                    "Skipping {} of '{}': {} is reserved for the essence map",
                    variant,
                    node.path,
                    path.display()
                );
                continue;
            }
            write_file(&path, text, report).await?;
        }
        Ok(())
    }

    /// Delete an installed library; missing files are not an error
    pub async fn remove(&self, library: &str) -> Result<()> {
        validate_library_name(library)?;

        let dir = self.library_dir(library);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!("Removed {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", dir.display()));
            }
        }

        for suffix in [DIGEST_SUFFIX, FULLTEXT_SUFFIX] {
            let file = self.dest.join(format!("{library}{suffix}"));
            match tokio::fs::remove_file(&file).await {
                Ok(()) => tracing::debug!("Removed {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", file.display()));
                }
            }
        }

        Ok(())
    }
}

async fn ensure_dir(path: &Path, report: &mut InstallReport) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    report.directories_created += 1;
    Ok(())
}

async fn write_file(path: &Path, contents: &str, report: &mut InstallReport) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    report.files_written += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::manifest::{DocKind, ManifestMetadata};
    use crate::cache::tree::DocItem;
    use crate::cache::types::DocPath;
    use crate::cache::variants::MarkdownVariants;
    use std::fs;
    use tempfile::TempDir;

    fn item(variants: &[(Variant, &str)]) -> DocItem {
        DocItem {
            kind: DocKind::Page,
            path: String::new(),
            relevant: true,
            usage: None,
            token_counts: None,
            markdown: variants
                .iter()
                .map(|(v, text)| (*v, text.to_string()))
                .collect::<MarkdownVariants>(),
        }
    }

    fn library(name: &str, root: TreeNode) -> Library {
        Library {
            name: name.to_string(),
            metadata: ManifestMetadata::default(),
            root,
        }
    }

    fn sample_library() -> Library {
        let mut root = TreeNode::root();
        root.data = Some(item(&[
            (Variant::Digest, "root digest"),
            (Variant::Fulltext, "root fulltext"),
            (Variant::Essence, "Reactive UI"),
        ]));
        root.insert(
            &DocPath::parse("runes"),
            item(&[
                (Variant::Digest, "runes digest"),
                (Variant::Essence, "Compiler\nsignals"),
            ]),
        );
        root.insert(
            &DocPath::parse("runes/$state"),
            item(&[
                (Variant::Digest, "state digest"),
                (Variant::Fulltext, "state fulltext"),
                (Variant::ShortDigest, "state short"),
            ]),
        );
        root.insert(&DocPath::parse("api"), item(&[(Variant::Essence, "API")]));
        library("svelte", root)
    }

    #[tokio::test]
    async fn test_install_layout() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let installer = Installer::new(temp_dir.path());

        installer.install(&sample_library()).await?;

        let dest = temp_dir.path();
        assert_eq!(fs::read_to_string(dest.join("svelte.md"))?, "root digest");
        assert_eq!(
            fs::read_to_string(dest.join("svelte.md.fulltext"))?,
            "root fulltext"
        );
        assert_eq!(
            fs::read_to_string(dest.join("svelte/runes.md"))?,
            "runes digest"
        );
        assert!(!dest.join("svelte/runes.md.fulltext").exists());
        assert!(dest.join("svelte/runes").is_dir());
        assert_eq!(
            fs::read_to_string(dest.join("svelte/runes/$state.md"))?,
            "state digest"
        );
        assert_eq!(
            fs::read_to_string(dest.join("svelte/runes/$state.md.fulltext"))?,
            "state fulltext"
        );
        assert!(!dest.join("svelte/runes/$state").exists());
        assert!(!dest.join("svelte/api.md").exists());
        assert!(installer.is_installed("svelte").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_llm_map() -> Result<()> {
        let temp_dir = TempDir::new()?;
        Installer::new(temp_dir.path())
            .install(&sample_library())
            .await?;

        let map = fs::read_to_string(temp_dir.path().join("svelte/LLM_MAP.md"))?;
        assert_eq!(
            map,
            "# svelte Map\n\nReactive UI\n\n  - api: API\n  - runes: Compiler signals\n    - $state\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_install_root_with_only_essence() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut root = TreeNode::root();
        root.data = Some(item(&[(Variant::Essence, "Just a summary")]));

        Installer::new(temp_dir.path())
            .install(&library("tiny", root))
            .await?;

        let dest = temp_dir.path();
        assert!(!dest.join("tiny.md").exists());
        assert!(!dest.join("tiny.md.fulltext").exists());
        let map = fs::read_to_string(dest.join("tiny/LLM_MAP.md"))?;
        assert_eq!(map, "# tiny Map\n\nJust a summary\n\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_page_named_like_map_keeps_map() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut root = TreeNode::root();
        root.insert(
            &DocPath::parse("LLM_MAP"),
            item(&[
                (Variant::Digest, "page digest"),
                (Variant::Fulltext, "page fulltext"),
                (Variant::Essence, "A page"),
            ]),
        );

        Installer::new(temp_dir.path())
            .install(&library("odd", root))
            .await?;

        let dest = temp_dir.path();
        assert_eq!(
            fs::read_to_string(dest.join("odd/LLM_MAP.md"))?,
            "# odd Map\n\n  - LLM_MAP: A page\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("odd/LLM_MAP.md.fulltext"))?,
            "page fulltext"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_remove() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let installer = Installer::new(temp_dir.path());
        installer.install(&sample_library()).await?;

        installer.remove("svelte").await?;

        assert!(!temp_dir.path().join("svelte").exists());
        assert!(!temp_dir.path().join("svelte.md").exists());
        assert!(!temp_dir.path().join("svelte.md.fulltext").exists());
        assert!(!installer.is_installed("svelte").await);

        // Removing again is a no-op
        installer.remove("svelte").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_unsafe_library_names() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let installer = Installer::new(temp_dir.path().join("dest"));

        let escaping = library("..", TreeNode::root());
        assert!(installer.install(&escaping).await.is_err());
        assert!(installer.remove("../other").await.is_err());
        assert!(!temp_dir.path().join("dest").exists());
        Ok(())
    }
}
