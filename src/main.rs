use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lovely_docs::LovelyDocsService;
use lovely_docs::cache::LibraryCache;
use lovely_docs::cache::constants::INSTALL_DIR;
use lovely_docs::cache::types::validate_library_name;
use lovely_docs::config::{ProjectConfig, expand_path};
use lovely_docs::docs::query::LibraryFilterOptions;
use lovely_docs::install::Installer;
use lovely_docs::repo::DocRepo;

/// Multi-resolution library documentation for LLMs, as an MCP server and project CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Documentation corpus directory (defaults to the synced git repository's doc_db)
    #[arg(long, env = "LOVELY_DOCS_DIR", global = true)]
    doc_dir: Option<String>,

    /// Directory holding git clones (defaults to the platform cache dir)
    #[arg(long, env = "LOVELY_DOCS_GIT_CACHE_DIR", global = true)]
    git_cache_dir: Option<PathBuf>,

    /// Project directory holding .lovely-docs.yaml (defaults to the current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Only expose these libraries when serving (repeatable)
    #[arg(long = "library", global = true)]
    libraries: Vec<String>,

    /// Only expose libraries in these ecosystems when serving (repeatable)
    #[arg(long = "ecosystem", global = true)]
    ecosystems: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the documentation over MCP on stdio (the default)
    Serve,
    /// Write the project config and sync the documentation repository
    Init {
        /// Git repository URL
        #[arg(long)]
        repo: Option<String>,
        /// Git branch name
        #[arg(long)]
        branch: Option<String>,
        /// Skip the git sync
        #[arg(long)]
        no_sync: bool,
    },
    /// List available libraries by ecosystem
    List,
    /// Install a library into the project's .lovely-docs directory
    Add {
        library: String,
        /// Overwrite an existing install
        #[arg(long)]
        force: bool,
    },
    /// Remove an installed library
    Remove { library: String },
}

impl Args {
    fn filter_options(&self) -> LibraryFilterOptions {
        let non_empty = |names: &Vec<String>| (!names.is_empty()).then(|| names.clone());
        LibraryFilterOptions {
            libraries: non_empty(&self.libraries),
            ecosystems: non_empty(&self.ecosystems),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(mut args: Args) -> Result<()> {
    let project_dir = match &args.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    match args.command.take().unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let options = args.filter_options();
            serve(&args, &project_dir, options).await
        }
        Commands::Init {
            repo,
            branch,
            no_sync,
        } => init(&args, &project_dir, repo, branch, no_sync).await,
        Commands::List => list(&args, &project_dir).await,
        Commands::Add { library, force } => add(&args, &project_dir, &library, force).await,
        Commands::Remove { library } => remove(&project_dir, &library).await,
    }
}

/// Corpus location: `--doc-dir`, then the config's `doc_dir`, then the git clone
fn doc_dir(args: &Args, config: &ProjectConfig) -> Result<PathBuf> {
    if let Some(raw) = &args.doc_dir {
        return expand_path(raw);
    }
    if let Some(dir) = &config.doc_dir {
        return expand_path(&dir.to_string_lossy());
    }
    Ok(DocRepo::new(args.git_cache_dir.clone())?.doc_db_path(&config.repo))
}

async fn require_config(project_dir: &Path) -> Result<ProjectConfig> {
    match ProjectConfig::load(project_dir).await? {
        Some(config) => Ok(config),
        None => bail!("Project not initialized. Run `lovely-docs init` first."),
    }
}

async fn serve(args: &Args, project_dir: &Path, options: LibraryFilterOptions) -> Result<()> {
    let config = ProjectConfig::load(project_dir)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Ignoring project config: {:#}", e);
            None
        })
        .unwrap_or_default();
    let doc_dir = doc_dir(args, &config)?;

    tracing::info!("Starting lovely-docs MCP server on stdio...");
    tracing::info!("Using documentation from {}", doc_dir.display());

    let cache = LibraryCache::scan(&doc_dir).await;
    if cache.is_empty() {
        tracing::warn!("No libraries found in {}", doc_dir.display());
    }

    let service = LovelyDocsService::new(Arc::new(cache), options)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}

async fn init(
    args: &Args,
    project_dir: &Path,
    repo: Option<String>,
    branch: Option<String>,
    no_sync: bool,
) -> Result<()> {
    let mut config = ProjectConfig::load(project_dir).await?.unwrap_or_default();
    if let Some(repo) = repo {
        config.repo = repo;
    }
    if let Some(branch) = branch {
        config.branch = branch;
    }
    if let Some(raw) = &args.doc_dir {
        config.doc_dir = Some(expand_path(raw)?);
    }

    if config.doc_dir.is_none() && !no_sync {
        let doc_repo = DocRepo::new(args.git_cache_dir.clone())?;
        let (url, branch) = (config.repo.clone(), config.branch.clone());
        let doc_db = tokio::task::spawn_blocking(move || doc_repo.sync(&url, &branch))
            .await
            .context("Sync task failed")??;
        println!("Documentation synced to {}", doc_db.display());
    }

    config.save(project_dir).await?;
    println!(
        "Initialized lovely-docs in {}",
        ProjectConfig::path(project_dir).display()
    );
    Ok(())
}

async fn list(args: &Args, project_dir: &Path) -> Result<()> {
    let config = require_config(project_dir).await?;
    let cache = LibraryCache::scan(&doc_dir(args, &config)?).await;

    if cache.is_empty() {
        println!("No libraries found. Try running `lovely-docs init` again to sync.");
        return Ok(());
    }

    let mut by_ecosystem: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut other = Vec::new();
    for summary in cache.list() {
        if summary.ecosystems.is_empty() {
            other.push(summary.name);
        } else {
            for ecosystem in summary.ecosystems {
                by_ecosystem
                    .entry(ecosystem)
                    .or_default()
                    .push(summary.name.clone());
            }
        }
    }

    let installed = |name: &str| {
        if config.is_installed(name) {
            " (installed)"
        } else {
            ""
        }
    };

    println!("Available libraries:");
    for (ecosystem, names) in &by_ecosystem {
        println!("\n{ecosystem}:");
        for name in names {
            println!("  {name}{}", installed(name));
        }
    }
    if !other.is_empty() {
        println!("\nOther:");
        for name in &other {
            println!("  {name}{}", installed(name));
        }
    }
    Ok(())
}

async fn add(args: &Args, project_dir: &Path, library: &str, force: bool) -> Result<()> {
    validate_library_name(library)?;
    let mut config = require_config(project_dir).await?;
    let doc_dir = doc_dir(args, &config)?;
    let lib = LibraryCache::load_library(&doc_dir.join(library), library)
        .await
        .with_context(|| {
            format!("Library '{library}' not found. Run `lovely-docs list` to see available libraries.")
        })?;

    let installer = Installer::new(project_dir.join(INSTALL_DIR));
    if installer.is_installed(library).await {
        if !force {
            bail!("Library '{library}' is already installed. Use --force to overwrite.");
        }
        installer.remove(library).await?;
    }

    let report = installer.install(&lib).await?;
    if config.add_installed(library) {
        config.save(project_dir).await?;
    }

    println!(
        "Installed {} ({} files) into {}",
        library,
        report.files_written,
        installer.dest().display()
    );
    Ok(())
}

async fn remove(project_dir: &Path, library: &str) -> Result<()> {
    let mut config = require_config(project_dir).await?;
    Installer::new(project_dir.join(INSTALL_DIR))
        .remove(library)
        .await?;

    if config.remove_installed(library) {
        config.save(project_dir).await?;
    }
    println!("Removed {library}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_without_subcommand() -> Result<()> {
        let args = Args::try_parse_from([
            "lovely-docs",
            "--library",
            "svelte",
            "--library",
            "tokio",
            "--ecosystem",
            "js",
        ])?;

        assert!(args.command.is_none());
        let options = args.filter_options();
        assert_eq!(
            options.libraries,
            Some(vec!["svelte".to_string(), "tokio".to_string()])
        );
        assert_eq!(options.ecosystems, Some(vec!["js".to_string()]));
        Ok(())
    }

    #[test]
    fn test_filters_after_serve() -> Result<()> {
        let args = Args::try_parse_from(["lovely-docs", "serve", "--ecosystem", "rust"])?;

        assert!(matches!(args.command, Some(Commands::Serve)));
        let options = args.filter_options();
        assert_eq!(options.libraries, None);
        assert_eq!(options.ecosystems, Some(vec!["rust".to_string()]));
        Ok(())
    }

    #[test]
    fn test_no_filters_by_default() -> Result<()> {
        let args = Args::try_parse_from(["lovely-docs", "list"])?;
        let options = args.filter_options();
        assert_eq!((options.libraries, options.ecosystems), (None, None));
        Ok(())
    }
}
