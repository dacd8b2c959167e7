//! Output types for documentation tools
//!
//! These types are the return values of the docs tool methods. Tool and
//! resource payloads are rendered as YAML, which reads better than JSON in
//! a model's context window.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::docs::query::{ListingEntry, Page};

/// Render any serializable value as trimmed YAML
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> String {
    serde_yaml::to_string(value)
        .map(|yaml| yaml.trim().to_string())
        .unwrap_or_else(|e| format!("error: Failed to serialize response: {e}"))
}

/// Output from listLibraries
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum ListLibrariesOutput {
    Names(Vec<String>),
    Verbose(BTreeMap<String, Option<String>>),
}

impl ListLibrariesOutput {
    pub fn new(index: BTreeMap<String, Option<String>>, verbose: bool) -> Self {
        if verbose {
            ListLibrariesOutput::Verbose(index)
        } else {
            ListLibrariesOutput::Names(index.into_keys().collect())
        }
    }

    pub fn to_yaml(&self) -> String {
        to_yaml(self)
    }
}

/// Output from listPages
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ListPagesOutput {
    pub tree: Vec<ListingEntry>,
}

impl ListPagesOutput {
    /// The bare listing, as returned by the tool
    pub fn to_yaml(&self) -> String {
        to_yaml(&self.tree)
    }

    /// The listing under a `/` key, as returned by the page-index resource
    pub fn to_rooted_yaml(&self) -> String {
        let rooted: BTreeMap<&str, &Vec<ListingEntry>> = BTreeMap::from([("/", &self.tree)]);
        to_yaml(&rooted)
    }
}

/// Output from getPage
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct GetPageOutput {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ListingEntry>>,
}

impl From<Page<'_>> for GetPageOutput {
    fn from(page: Page<'_>) -> Self {
        Self {
            text: page.text.to_string(),
            children: page.children,
        }
    }
}

impl GetPageOutput {
    /// Page text followed by the sub-page menu, if any
    pub fn render(&self) -> String {
        match &self.children {
            Some(children) => format!(
                "{}\nAvailable sub-pages:\n{}",
                self.text,
                to_yaml(children)
            ),
            None => self.text.clone(),
        }
    }
}

/// Error output for docs tools
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct DocsErrorOutput {
    pub error: String,
}

impl DocsErrorOutput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl std::fmt::Display for DocsErrorOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}
