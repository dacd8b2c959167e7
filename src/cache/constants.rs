//! Constants for corpus and install file names

/// Directory names
pub const APP_DIR: &str = "lovely-docs";
pub const GIT_DIR: &str = "git";
pub const DOC_DB_DIR: &str = "doc_db";
pub const INSTALL_DIR: &str = ".lovely-docs";

/// File names
pub const MANIFEST_FILE: &str = "index.json";
pub const LLM_MAP_FILE: &str = "LLM_MAP.md";
pub const CONFIG_FILE: &str = ".lovely-docs.yaml";

/// Installed file suffixes
pub const DIGEST_SUFFIX: &str = ".md";
pub const FULLTEXT_SUFFIX: &str = ".md.fulltext";

/// Manifest path separator
pub const PATH_SEPARATOR: char = '/';

/// Ecosystem wildcard accepted by library filters
pub const ANY_ECOSYSTEM: &str = "*";

/// Defaults for the project configuration
pub const DEFAULT_REPO: &str = "https://github.com/xl0/lovely-docs";
pub const DEFAULT_BRANCH: &str = "master";
