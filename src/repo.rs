//! Git-backed copy of the documentation corpus

use anyhow::{Context, Result, bail};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository, ResetType};
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::constants::{APP_DIR, DOC_DB_DIR, GIT_DIR};

/// Local clones of documentation repositories
#[derive(Debug, Clone)]
pub struct DocRepo {
    cache_dir: PathBuf,
}

impl DocRepo {
    /// Use `cache_dir`, or `{platform cache dir}/lovely-docs/git` when not given
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => dirs::cache_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
                .join(APP_DIR)
                .join(GIT_DIR),
        };
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Clone location for `repo_url`: `{cache}/{host}/{path without .git}`
    pub fn repo_path(&self, repo_url: &str) -> PathBuf {
        let Ok(url) = Url::parse(repo_url) else {
            return self.cache_dir.join("default");
        };
        let Some(host) = url.host_str() else {
            return self.cache_dir.join("default");
        };

        let path = url.path().trim_start_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        path.split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .fold(self.cache_dir.join(host), |dir, segment| dir.join(segment))
    }

    /// Location of the corpus inside the clone of `repo_url`
    pub fn doc_db_path(&self, repo_url: &str) -> PathBuf {
        self.repo_path(repo_url).join(DOC_DB_DIR)
    }

    /// Clone `repo_url` at `branch`, or bring an existing clone to
    /// `origin/{branch}`, and return the corpus path
    ///
    /// This blocks on network I/O; run it on a blocking thread from async code.
    pub fn sync(&self, repo_url: &str, branch: &str) -> Result<PathBuf> {
        let target = self.repo_path(repo_url);

        if !target.exists() {
            tracing::info!("Cloning {} to {}", repo_url, target.display());
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            let mut builder = RepoBuilder::new();
            builder.branch(branch).fetch_options(fetch_options());
            builder
                .clone(repo_url, &target)
                .with_context(|| format!("Failed to clone repository: {repo_url}"))?;
        } else {
            if !target.join(".git").exists() {
                bail!(
                    "{} exists but is not a git repository",
                    target.display()
                );
            }

            tracing::info!("Syncing {} ({})", repo_url, branch);
            let repo = Repository::open(&target)
                .with_context(|| format!("Failed to open repository: {}", target.display()))?;
            let mut remote = repo
                .find_remote("origin")
                .context("Repository has no origin remote")?;
            let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
            remote
                .fetch(&[refspec.as_str()], Some(&mut fetch_options()), None)
                .with_context(|| format!("Failed to fetch origin/{branch}"))?;

            let commit = repo
                .find_reference(&format!("refs/remotes/origin/{branch}"))
                .and_then(|reference| reference.peel_to_commit())
                .with_context(|| format!("Could not find branch: origin/{branch}"))?;
            repo.reset(
                commit.as_object(),
                ResetType::Hard,
                Some(CheckoutBuilder::default().force()),
            )
            .with_context(|| format!("Failed to reset to origin/{branch}"))?;
        }

        Ok(target.join(DOC_DB_DIR))
    }
}

fn fetch_options() -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Ok(token) = env::var("GITHUB_TOKEN") {
        tracing::debug!("Using GITHUB_TOKEN for authentication");
        callbacks.credentials(move |_url, username_from_url, _allowed_types| {
            Cred::userpass_plaintext(username_from_url.unwrap_or("git"), &token)
        });
    }

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}
