//! Project settings persisted in `.lovely-docs.yaml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::cache::constants::{CONFIG_FILE, DEFAULT_BRANCH, DEFAULT_REPO};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Git repository holding the documentation corpus
    pub repo: String,
    pub branch: String,
    /// Names of libraries installed into the project
    pub installed: Vec<String>,
    /// Local corpus directory, used instead of syncing `repo`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_dir: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            installed: Vec::new(),
            doc_dir: None,
        }
    }
}

impl ProjectConfig {
    /// Path of the settings file inside `project_dir`
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE)
    }

    /// Load the settings of `project_dir`, or `None` if there are none yet
    ///
    /// A document that does not match the schema keeps every field that
    /// does, with defaults for the rest.
    pub async fn load(project_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(project_dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        Ok(Some(Self::parse(&content)))
    }

    pub fn parse(content: &str) -> Self {
        match serde_yaml::from_str::<Self>(content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid {}: {}; using defaults for bad fields", CONFIG_FILE, e);
                Self::merge_lenient(serde_yaml::from_str(content).unwrap_or(Value::Null))
            }
        }
    }

    fn merge_lenient(value: Value) -> Self {
        let mut config = Self::default();
        if let Some(repo) = value.get("repo").and_then(Value::as_str) {
            config.repo = repo.to_string();
        }
        if let Some(branch) = value.get("branch").and_then(Value::as_str) {
            config.branch = branch.to_string();
        }
        if let Some(installed) = value.get("installed").and_then(Value::as_sequence) {
            config.installed = installed
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(doc_dir) = value.get("doc_dir").and_then(Value::as_str) {
            config.doc_dir = Some(PathBuf::from(doc_dir));
        }
        config
    }

    pub async fn save(&self, project_dir: &Path) -> Result<()> {
        let path = Self::path(project_dir);
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn is_installed(&self, library: &str) -> bool {
        self.installed.iter().any(|name| name == library)
    }

    /// Record `library` as installed; returns false if it already was
    pub fn add_installed(&mut self, library: &str) -> bool {
        if self.is_installed(library) {
            return false;
        }
        self.installed.push(library.to_string());
        true
    }

    /// Forget `library`; returns false if it was not recorded
    pub fn remove_installed(&mut self, library: &str) -> bool {
        let before = self.installed.len();
        self.installed.retain(|name| name != library);
        self.installed.len() != before
    }
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
