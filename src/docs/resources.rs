//! `lovely-docs://` resource URIs
//!
//! Supported forms:
//!
//! - `lovely-docs://doc-index/{ecosystem}`
//! - `lovely-docs://doc-index-verbose/{ecosystem}`
//! - `lovely-docs://index/{library}`
//! - `lovely-docs://page/{library}/{path...}?level={level}`

use percent_encoding::percent_decode_str;
use url::Url;

use crate::cache::constants::ANY_ECOSYSTEM;
use crate::cache::variants::MarkdownLevel;
use crate::docs::outputs::ListLibrariesOutput;
use crate::docs::query::{QueryError, library_index};
use crate::docs::tools::DocsTools;

pub const SCHEME: &str = "lovely-docs";

pub const DOC_INDEX_TEMPLATE: &str = "lovely-docs://doc-index/{ecosystem}";
pub const DOC_INDEX_VERBOSE_TEMPLATE: &str = "lovely-docs://doc-index-verbose/{ecosystem}";
pub const PAGE_INDEX_TEMPLATE: &str = "lovely-docs://index/{name}";
pub const PAGE_TEMPLATE: &str = "lovely-docs://page/{path*}{?level}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("Invalid resource URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ResourceError {
    /// Whether the failure is the caller's fault rather than missing content
    pub fn is_invalid_request(&self) -> bool {
        !matches!(
            self,
            ResourceError::Query(
                QueryError::UnknownLibrary(_)
                    | QueryError::PathNotFound { .. }
                    | QueryError::LevelUnavailable { .. }
            )
        )
    }
}

/// A parsed resource URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRequest {
    DocIndex {
        ecosystem: String,
        verbose: bool,
    },
    PageIndex {
        library: String,
    },
    Page {
        library: String,
        path: Option<String>,
        level: Option<MarkdownLevel>,
    },
}

impl ResourceRequest {
    pub fn parse(uri: &str) -> Result<Self, ResourceError> {
        let invalid = |reason: &str| ResourceError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != SCHEME {
            return Err(invalid("unsupported scheme"));
        }

        let segments = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .map(|s| {
                percent_decode_str(s)
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
                    .map_err(|_| invalid("path is not valid UTF-8"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match url.host_str() {
            Some(kind @ ("doc-index" | "doc-index-verbose")) => Ok(ResourceRequest::DocIndex {
                ecosystem: segments
                    .first()
                    .cloned()
                    .unwrap_or_else(|| ANY_ECOSYSTEM.to_string()),
                verbose: kind == "doc-index-verbose",
            }),
            Some("index") => {
                let library = segments
                    .into_iter()
                    .next()
                    .ok_or(ResourceError::MissingParameter("name"))?;
                Ok(ResourceRequest::PageIndex { library })
            }
            Some("page") => {
                let mut segments = segments.into_iter();
                let library = segments
                    .next()
                    .ok_or(ResourceError::MissingParameter("path"))?;
                let rest: Vec<String> = segments.collect();
                let path = (!rest.is_empty()).then(|| rest.join("/"));

                let level = url
                    .query_pairs()
                    .find(|(key, _)| key == "level")
                    .map(|(_, value)| value.parse::<MarkdownLevel>())
                    .transpose()
                    .map_err(QueryError::InvalidLevel)?;

                Ok(ResourceRequest::Page {
                    library,
                    path,
                    level,
                })
            }
            _ => Err(invalid("unknown resource")),
        }
    }

    /// Resolve the request to its text body
    pub fn read(&self, tools: &DocsTools) -> Result<String, ResourceError> {
        match self {
            ResourceRequest::DocIndex { ecosystem, verbose } => {
                let index = library_index(&tools.libraries(), ecosystem);
                Ok(ListLibrariesOutput::new(index, *verbose).to_yaml())
            }
            ResourceRequest::PageIndex { library } => {
                Ok(tools.page_index(library, false)?.to_rooted_yaml())
            }
            ResourceRequest::Page {
                library,
                path,
                level,
            } => Ok(tools.page(library, path.as_deref(), *level)?.render()),
        }
    }
}
