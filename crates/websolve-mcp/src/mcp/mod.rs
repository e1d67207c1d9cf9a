pub(crate) mod envelope;

use crate::app::App;
use crate::ops::{
    self, AnalyzeSearchResultsArgs, FetchWebContentArgs, FindErrorSolutionsArgs,
    MetasearchWebArgs, ToolOutput,
};
use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use std::sync::Arc;

fn tool_result(out: ToolOutput) -> CallToolResult {
    // Structured payload for machine consumers; Markdown in content[0] for chat clients.
    let mut r = CallToolResult::structured(out.payload);
    r.content = vec![Content::text(out.markdown)];
    r
}

#[derive(Clone)]
pub(crate) struct WebsolveMcp {
    tool_router: RmcpToolRouter<Self>,
    app: Arc<App>,
}

#[tool_router]
impl WebsolveMcp {
    pub(crate) fn new(app: Arc<App>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            app,
        }
    }

    #[tool(
        description = "Search the web through SearXNG. Supports paging, time range (day/week/month/year), language and safe search (0-2)."
    )]
    async fn metasearch_web(
        &self,
        params: Parameters<Option<MetasearchWebArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        Ok(tool_result(ops::metasearch_web(&self.app, args).await))
    }

    #[tool(
        description = "Fetch a public URL and return it as markdown (default), html, text or json. raw=true skips conversion."
    )]
    async fn fetch_web_content(
        &self,
        params: Parameters<Option<FetchWebContentArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        Ok(tool_result(ops::fetch_web_content(&self.app, args).await))
    }

    #[tool(
        description = "Analyze a list of search results: summary, trends, sources, keywords or relevance. No network access."
    )]
    async fn analyze_search_results(
        &self,
        params: Parameters<Option<AnalyzeSearchResultsArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        Ok(tool_result(ops::analyze_search_results(args)))
    }

    #[tool(
        description = "Find ranked solutions for an error message or stack trace: extracts the error kind and key terms, searches Q&A sites, code hosts and docs, then scores the hits."
    )]
    async fn find_error_solutions(
        &self,
        params: Parameters<Option<FindErrorSolutionsArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        Ok(tool_result(ops::find_error_solutions(&self.app, args).await))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for WebsolveMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Error-solution finder over SearXNG. Start with find_error_solutions for an error message; use metasearch_web and fetch_web_content to dig further. Outputs are schema-versioned JSON with a Markdown rendering."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub(crate) async fn serve_stdio(app: App) -> Result<(), McpError> {
    let svc = WebsolveMcp::new(Arc::new(app));
    tracing::info!("mcp stdio server starting");
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    tracing::info!("mcp stdio server stopped");
    Ok(())
}
