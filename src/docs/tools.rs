use std::sync::Arc;

use rmcp::schemars;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::LibraryCache;
use crate::cache::variants::MarkdownLevel;
use crate::docs::outputs::{DocsErrorOutput, GetPageOutput, ListLibrariesOutput, ListPagesOutput};
use crate::docs::query::{
    DocQuery, LibraryFilterOptions, LibraryIndex, QueryError, ecosystems, filter_ecosystems,
    filter_libraries, index_libraries, library_index,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListLibrariesParams {
    #[schemars(description = "Only list libraries in this ecosystem ('*' for all, the default)")]
    pub ecosystem: Option<String>,
    #[schemars(description = "Include a one-line description of each library")]
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListPagesParams {
    #[schemars(description = "The library name, as returned by listLibraries")]
    pub library: String,
    #[schemars(description = "Include a one-line description of each page")]
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetPageParams {
    #[schemars(description = "The library name, as returned by listLibraries")]
    pub library: String,
    #[schemars(
        description = "Page path within the library (e.g., 'runes/$state'). Omit for the library's root page"
    )]
    pub page: Option<String>,
    #[schemars(description = "Detail level: fulltext, digest (default) or short_digest")]
    pub level: Option<MarkdownLevel>,
}

#[derive(Debug, Clone)]
pub struct DocsTools {
    cache: Arc<LibraryCache>,
    options: LibraryFilterOptions,
}

impl DocsTools {
    pub fn new(cache: Arc<LibraryCache>, options: LibraryFilterOptions) -> Self {
        Self { cache, options }
    }

    /// Libraries visible through the configured filter
    pub fn libraries(&self) -> LibraryIndex {
        filter_libraries(&index_libraries(self.cache.list()), &self.options)
    }

    /// Sorted ecosystem tags visible through the configured filter
    pub fn ecosystems(&self) -> Vec<String> {
        let all = ecosystems(&index_libraries(self.cache.list()));
        filter_ecosystems(all, &self.options).into_iter().collect()
    }

    fn ensure_visible(&self, library: &str) -> Result<(), QueryError> {
        if self.libraries().contains_key(library) {
            Ok(())
        } else {
            Err(QueryError::UnknownLibrary(library.to_string()))
        }
    }

    pub fn list_libraries(&self, params: ListLibrariesParams) -> ListLibrariesOutput {
        let ecosystem = params.ecosystem.as_deref().unwrap_or("*");
        let index = library_index(&self.libraries(), ecosystem);
        ListLibrariesOutput::new(index, params.verbose.unwrap_or(false))
    }

    /// Flattened listing of a visible library
    pub fn page_index(&self, library: &str, verbose: bool) -> Result<ListPagesOutput, QueryError> {
        self.ensure_visible(library)?;
        let tree = DocQuery::new(&self.cache).page_index(library, verbose)?;
        Ok(ListPagesOutput { tree })
    }

    /// Page of a visible library
    pub fn page(
        &self,
        library: &str,
        page: Option<&str>,
        level: Option<MarkdownLevel>,
    ) -> Result<GetPageOutput, QueryError> {
        tracing::debug!("page({}, {:?}, {:?})", library, page, level);
        self.ensure_visible(library)?;
        let page = DocQuery::new(&self.cache).get_page(library, page, level)?;
        Ok(GetPageOutput::from(page))
    }

    pub fn list_pages(&self, params: ListPagesParams) -> Result<ListPagesOutput, DocsErrorOutput> {
        self.page_index(&params.library, params.verbose.unwrap_or(false))
            .map_err(|e| DocsErrorOutput::new(e.to_string()))
    }

    pub fn get_page(&self, params: GetPageParams) -> Result<GetPageOutput, DocsErrorOutput> {
        self.page(&params.library, params.page.as_deref(), params.level)
            .map_err(|e| DocsErrorOutput::new(e.to_string()))
    }
}
