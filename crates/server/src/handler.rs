//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::site::Site;
use crate::tools::{NavClickParams, NavHighlightParams, SectionScrollParams, SiteFetchParams, nav, section, site_fetch, worker};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for folio-site.
#[derive(Clone)]
pub struct SiteServer {
    site: Arc<Site>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SiteServer {
    pub fn new(site: Arc<Site>) -> Self {
        Self { site, tool_router: Self::tool_router() }
    }

    /// Request a page resource through the offline cache worker.
    #[tool(
        description = "Fetch a site resource through the offline cache worker. Returns status, response type, where it was served from (network, cache or fallback) and the body."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        site_fetch::fetch_impl(&self.site, params.0).await
    }

    #[tool(
        description = "Show the controlling and waiting cache workers, whether an update is available, stored cache generations, the active section and loading state."
    )]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        worker::status_impl(&self.site).await
    }

    #[tool(description = "Activate the waiting cache worker (SKIP_WAITING) and make it control the page.")]
    async fn worker_update(&self) -> Result<CallToolResult, McpError> {
        worker::update_impl(&self.site).await
    }

    #[tool(description = "Delete every cache generation from storage.")]
    async fn worker_clear_cache(&self) -> Result<CallToolResult, McpError> {
        worker::clear_cache_impl(&self.site).await
    }

    /// Feed one frame of viewport and section geometry to the section boundaries.
    #[tool(
        description = "Process a scroll frame: viewport rect plus section rects. Sections crossing their visibility threshold become the active section."
    )]
    async fn section_scroll(&self, params: Parameters<SectionScrollParams>) -> Result<CallToolResult, McpError> {
        section::scroll_impl(&self.site, params.0).await
    }

    #[tool(
        description = "Render the navigation highlight for the given tab boxes, following the active section or a hovered tab."
    )]
    async fn nav_highlight(&self, params: Parameters<NavHighlightParams>) -> Result<CallToolResult, McpError> {
        nav::highlight_impl(&self.site, params.0).await
    }

    #[tool(description = "Click a navigation tab: sets the active section and returns the section to scroll to.")]
    async fn nav_click(&self, params: Parameters<NavClickParams>) -> Result<CallToolResult, McpError> {
        nav::click_impl(&self.site, params.0).await
    }
}

impl ServerHandler for SiteServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "folio-site".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
