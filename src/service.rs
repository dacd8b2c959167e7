use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{
        AnnotateAble, CallToolResult, Content, Implementation, ListResourceTemplatesResult,
        PaginatedRequestParam, RawResourceTemplate, ReadResourceRequestParam, ReadResourceResult,
        ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_handler, tool_router,
};

use crate::cache::LibraryCache;
use crate::docs::query::LibraryFilterOptions;
use crate::docs::resources::{
    DOC_INDEX_TEMPLATE, DOC_INDEX_VERBOSE_TEMPLATE, PAGE_INDEX_TEMPLATE, PAGE_TEMPLATE,
    ResourceRequest,
};
use crate::docs::tools::{DocsTools, GetPageParams, ListLibrariesParams, ListPagesParams};

const YAML_MIME: &str = "text/yaml";

#[derive(Debug, Clone)]
pub struct LovelyDocsService {
    docs_tools: DocsTools,
    tool_router: ToolRouter<Self>,
}

impl LovelyDocsService {
    pub fn new(cache: Arc<LibraryCache>, options: LibraryFilterOptions) -> Self {
        Self {
            docs_tools: DocsTools::new(cache, options),
            tool_router: Self::tool_router(),
        }
    }

    fn ecosystem_hint(&self) -> String {
        format!("[{}] or * for all", self.docs_tools.ecosystems().join(", "))
    }
}

#[tool_router]
impl LovelyDocsService {
    #[tool(
        name = "listLibraries",
        description = "List the libraries with documentation available. Optionally filter by ecosystem (see the server instructions for the available ones). Set verbose=true to get a one-line description of each library."
    )]
    pub async fn list_libraries(
        &self,
        params: Parameters<ListLibrariesParams>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.docs_tools.list_libraries(params.0);
        Ok(CallToolResult::success(vec![Content::text(output.to_yaml())]))
    }

    #[tool(
        name = "listPages",
        description = "List the documentation pages of a library as a nested tree. Get available libraries with the listLibraries tool."
    )]
    pub async fn list_pages(
        &self,
        params: Parameters<ListPagesParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(match self.docs_tools.list_pages(params.0) {
            Ok(output) => CallToolResult::success(vec![Content::text(output.to_yaml())]),
            Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
        })
    }

    #[tool(
        name = "getPage",
        description = "Get markdown content for a documentation page. Provide the library name, an optional page path within the library, and a detail level (fulltext, digest, short_digest). digest and fulltext responses end with a list of sub-pages."
    )]
    pub async fn get_page(
        &self,
        params: Parameters<GetPageParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(match self.docs_tools.get_page(params.0) {
            Ok(output) => CallToolResult::success(vec![Content::text(output.render())]),
            Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for LovelyDocsService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation::from_build_env(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some(format!(
                "Serves pre-generated documentation for third-party libraries at several levels of detail. Start with listLibraries (ecosystems: {}), browse a library with listPages, then read pages with getPage. digest is a good default level; use fulltext only when the digest is not enough.",
                self.ecosystem_hint()
            )),
            ..Default::default()
        }
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let hint = self.ecosystem_hint();
        let template = |uri_template: &str, name: &str, description: String| {
            RawResourceTemplate {
                uri_template: uri_template.to_string(),
                name: name.to_string(),
                description: Some(description),
                mime_type: Some(YAML_MIME.to_string()),
            }
            .no_annotation()
        };

        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: vec![
                template(
                    DOC_INDEX_TEMPLATE,
                    "doc-index",
                    format!("Index of available libraries. Ecosystems: {hint}."),
                ),
                template(
                    DOC_INDEX_VERBOSE_TEMPLATE,
                    "doc-index-verbose",
                    format!(
                        "Index of available libraries with a short description of each. Ecosystems: {hint}."
                    ),
                ),
                template(
                    PAGE_INDEX_TEMPLATE,
                    "page-index",
                    "Index of pages for a library".to_string(),
                ),
                template(
                    PAGE_TEMPLATE,
                    "doc-page",
                    "A doc page. path: library/path/to/page, just the library returns its root page. level: fulltext, digest or short_digest; digest is a good default.".to_string(),
                ),
            ],
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        tracing::debug!("read_resource({})", uri);

        let text = ResourceRequest::parse(&uri)
            .and_then(|resource| resource.read(&self.docs_tools))
            .map_err(|e| {
                let data = Some(serde_json::json!({ "uri": uri }));
                if e.is_invalid_request() {
                    McpError::invalid_params(e.to_string(), data)
                } else {
                    McpError::resource_not_found(e.to_string(), data)
                }
            })?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}
