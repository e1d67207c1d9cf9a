//! Tool operations shared by the MCP server and the CLI. Each returns a finished envelope
//! (JSON payload) plus its Markdown rendering; failures are envelopes too, never `Err`.

use crate::app::App;
use crate::mcp::envelope::{add_envelope_fields, error_obj, ErrorCode};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;
use websolve_core::{
    log_snippet, ContentFormat, ContentRequest, Error, SafeSearch, SearchQuery, TimeRange,
};
use websolve_pipeline::{AnalysisKind, AnalyzedResult, ResultAnalyzer};

/// Upper bound on `max_results` for `find_error_solutions`.
const MAX_SOLUTIONS: i64 = 50;

#[derive(Debug, Clone)]
pub(crate) struct ToolOutput {
    pub(crate) payload: serde_json::Value,
    pub(crate) markdown: String,
}

impl ToolOutput {
    pub(crate) fn ok(&self) -> bool {
        self.payload["ok"].as_bool().unwrap_or(false)
    }

    fn finish(mut payload: serde_json::Value, markdown: String, kind: &str, t0: Instant) -> Self {
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        Self { payload, markdown }
    }

    fn failure(
        kind: &str,
        t0: Instant,
        code: ErrorCode,
        message: impl ToString,
        request: serde_json::Value,
    ) -> Self {
        let message = message.to_string();
        let markdown = format!("**Error ({})**: {message}", code.as_str());
        let payload = serde_json::json!({
            "ok": false,
            "error": error_obj(code, &message, code.default_hint()),
            "request": request,
        });
        Self::finish(payload, markdown, kind, t0)
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub(crate) struct MetasearchWebArgs {
    /// Search query.
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Page number (default: 1).
    #[serde(default)]
    pub(crate) pageno: Option<u32>,
    /// Time range filter: day, week, month or year.
    #[serde(default)]
    pub(crate) time_range: Option<String>,
    /// Language code (e.g. en, de, fr).
    #[serde(default)]
    pub(crate) language: Option<String>,
    /// Safe search level: 0 (none), 1 (moderate), 2 (strict). Default 0.
    #[serde(default)]
    pub(crate) safesearch: Option<i64>,
    /// Cap on returned results (max 50).
    #[serde(default)]
    pub(crate) max_results: Option<usize>,
}

pub(crate) async fn metasearch_web(app: &App, args: MetasearchWebArgs) -> ToolOutput {
    const KIND: &str = "metasearch_web";
    let t0 = Instant::now();
    let query = args.query.unwrap_or_default();
    let request = serde_json::json!({
        "query": query,
        "pageno": args.pageno.unwrap_or(1),
        "time_range": args.time_range,
        "language": args.language,
        "safesearch": args.safesearch.unwrap_or(0),
        "max_results": args.max_results,
    });
    let invalid = |msg: String| {
        ToolOutput::failure(KIND, t0, ErrorCode::InvalidParams, msg, request.clone())
    };

    if query.trim().is_empty() {
        tracing::warn!("empty search query received");
        return invalid("Search query is required".to_string());
    }
    let page = args.pageno.unwrap_or(1);
    if page == 0 {
        return invalid("pageno must be at least 1".to_string());
    }
    let time_range = match args.time_range.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => match TimeRange::from_str(s) {
            Ok(tr) => Some(tr),
            Err(e) => return invalid(e.to_string()),
        },
        None => None,
    };
    let safesearch = match SafeSearch::from_level(args.safesearch.unwrap_or(0)) {
        Ok(s) => s,
        Err(e) => return invalid(e.to_string()),
    };
    let search = match app.search() {
        Ok(s) => s.clone(),
        Err(why) => {
            return ToolOutput::failure(KIND, t0, ErrorCode::NotConfigured, why, request);
        }
    };

    let q = SearchQuery {
        query: query.clone(),
        page,
        time_range,
        language: args.language.clone().filter(|l| !l.trim().is_empty()),
        safesearch,
        max_results: args.max_results,
        timeout_ms: None,
    };
    tracing::debug!(query = %log_snippet(&query), page, "metasearch");
    match search.search(&q).await {
        Ok(resp) => {
            let markdown = render_search_markdown(&resp.results);
            let payload = serde_json::json!({
                "ok": true,
                "query": query,
                "provider": resp.provider,
                "total_hint": resp.total_hint,
                "result_count": resp.results.len(),
                "results": resp.results,
                "request": request,
            });
            ToolOutput::finish(payload, markdown, KIND, t0)
        }
        Err(e) => {
            tracing::warn!(error = %e, query = %log_snippet(&query), "search failed");
            let code = ErrorCode::for_error(&e, ErrorCode::SearchFailed);
            ToolOutput::failure(KIND, t0, code, e, request)
        }
    }
}

fn render_search_markdown(results: &[websolve_core::SearchResult]) -> String {
    if results.is_empty() {
        return "No results found".to_string();
    }
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "**Result {}: {}**\nURL: {}\n",
            i + 1,
            r.title.as_deref().unwrap_or("No title"),
            r.url
        ));
        if let Some(snippet) = r.snippet.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            out.push_str(&format!("Content: {snippet}\n"));
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub(crate) struct FetchWebContentArgs {
    /// URL to fetch (absolute http/https).
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// Output format: markdown (default), html, text or json.
    #[serde(default)]
    pub(crate) format: Option<String>,
    /// Return the body without any processing (default: false).
    #[serde(default)]
    pub(crate) raw: Option<bool>,
    /// Read at most this many bytes; the result is then marked truncated.
    #[serde(default)]
    pub(crate) max_bytes: Option<u64>,
    /// Extra request headers, e.g. {"Accept-Language": "en"}. Authorization, Cookie and
    /// Proxy-Authorization are dropped unless WEBSOLVE_ALLOW_UNSAFE_HEADERS is set.
    #[serde(default)]
    pub(crate) headers: Option<BTreeMap<String, String>>,
}

pub(crate) async fn fetch_web_content(app: &App, args: FetchWebContentArgs) -> ToolOutput {
    const KIND: &str = "fetch_web_content";
    let t0 = Instant::now();
    let url = args.url.unwrap_or_default();
    let raw = args.raw.unwrap_or(false);
    let headers = args.headers.unwrap_or_default();
    // Names only: values may carry credentials.
    let header_names: Vec<&str> = headers.keys().map(String::as_str).collect();
    let request = serde_json::json!({
        "url": url,
        "format": args.format.as_deref().unwrap_or("markdown"),
        "raw": raw,
        "max_bytes": args.max_bytes,
        "headers": header_names,
    });

    if url.trim().is_empty() {
        tracing::warn!("empty URL received");
        return ToolOutput::failure(
            KIND,
            t0,
            ErrorCode::InvalidParams,
            "URL is required",
            request,
        );
    }
    let format = match ContentFormat::from_str(args.format.as_deref().unwrap_or("")) {
        Ok(f) => f,
        Err(e) => return ToolOutput::failure(KIND, t0, ErrorCode::InvalidParams, e, request),
    };

    let req = ContentRequest {
        url: url.trim().to_string(),
        format,
        raw,
        timeout_ms: None,
        max_bytes: args.max_bytes,
        headers,
    };
    tracing::debug!(url = %log_snippet(&url), format = format.as_str(), "fetch");
    match app.pages().fetch_content(&req).await {
        Ok(page) => {
            let payload = serde_json::json!({
                "ok": true,
                "url": page.url,
                "final_url": page.final_url,
                "format": page.format,
                "title": page.title,
                "content_type": page.content_type,
                "body_bytes": page.body_bytes,
                "truncated": page.truncated,
                "content": page.content,
                "request": request,
            });
            ToolOutput::finish(payload, page.content, KIND, t0)
        }
        Err(e) => {
            tracing::warn!(error = %e, url = %log_snippet(&url), "fetch failed");
            let code = ErrorCode::for_error(&e, ErrorCode::FetchFailed);
            // Keep the size-limit message verbatim for clients that match on it.
            let message = match &e {
                Error::Fetch(m) => m.clone(),
                other => other.to_string(),
            };
            ToolOutput::failure(KIND, t0, code, message, request)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub(crate) struct SearchResultItem {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) url: Option<String>,
    #[serde(default)]
    pub(crate) content: Option<String>,
}

impl From<SearchResultItem> for AnalyzedResult {
    fn from(r: SearchResultItem) -> Self {
        Self {
            title: r.title.unwrap_or_default(),
            url: r.url.unwrap_or_default(),
            content: r.content.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub(crate) struct AnalyzeSearchResultsArgs {
    /// Search result objects (title, url, content), e.g. from metasearch_web.
    #[serde(default)]
    pub(crate) search_results: Option<Vec<SearchResultItem>>,
    /// summary (default), trends, sources, keywords or relevance.
    #[serde(default)]
    pub(crate) analysis_type: Option<String>,
    /// Maximum number of results to analyze (default: 10).
    #[serde(default)]
    pub(crate) max_results: Option<usize>,
}

pub(crate) fn analyze_search_results(args: AnalyzeSearchResultsArgs) -> ToolOutput {
    const KIND: &str = "analyze_search_results";
    let t0 = Instant::now();
    let results: Vec<AnalyzedResult> = args
        .search_results
        .unwrap_or_default()
        .into_iter()
        .map(AnalyzedResult::from)
        .collect();
    let max_results = args.max_results.unwrap_or(10);
    let request = serde_json::json!({
        "result_count": results.len(),
        "analysis_type": args.analysis_type.as_deref().unwrap_or("summary"),
        "max_results": max_results,
    });
    let invalid = |msg: String| {
        ToolOutput::failure(KIND, t0, ErrorCode::InvalidParams, msg, request.clone())
    };

    if results.is_empty() {
        return invalid("No search results provided for analysis".to_string());
    }
    if max_results == 0 {
        return invalid("max_results must be at least 1".to_string());
    }
    let kind = match args.analysis_type.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => match AnalysisKind::from_str(s) {
            Ok(k) => k,
            Err(e) => return invalid(e.to_string()),
        },
        None => AnalysisKind::default(),
    };

    let analysis = ResultAnalyzer::new(max_results, 2).analyze(&results, kind);
    let pretty = serde_json::to_string_pretty(&analysis).unwrap_or_else(|_| analysis.to_string());
    let markdown = format!("# Analysis: {}\n\n```json\n{pretty}\n```\n", kind.as_str());
    let payload = serde_json::json!({
        "ok": true,
        "analysis_type": kind.as_str(),
        "analyzed": results.len().min(max_results),
        "analysis": analysis,
        "request": request,
    });
    ToolOutput::finish(payload, markdown, KIND, t0)
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub(crate) struct FindErrorSolutionsArgs {
    /// The error message or stack trace to solve.
    #[serde(default)]
    pub(crate) error_message: Option<String>,
    /// Optional technology hint (e.g. "rust", "django"); added to every query.
    #[serde(default)]
    pub(crate) tech_stack: Option<String>,
    /// Number of ranked solutions to return (default: 5, max: 50).
    #[serde(default)]
    pub(crate) max_results: Option<i64>,
}

pub(crate) async fn find_error_solutions(app: &App, args: FindErrorSolutionsArgs) -> ToolOutput {
    const KIND: &str = "find_error_solutions";
    let t0 = Instant::now();
    let message = args.error_message.unwrap_or_default();
    let tech_stack = args
        .tech_stack
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let max_results = args.max_results.unwrap_or(5);
    let request = serde_json::json!({
        "error_message": log_snippet(&message),
        "tech_stack": tech_stack,
        "max_results": max_results,
    });
    let invalid = |msg: &str| {
        ToolOutput::failure(KIND, t0, ErrorCode::InvalidParams, msg, request.clone())
    };

    if message.trim().is_empty() {
        return invalid("error_message must not be empty");
    }
    if max_results <= 0 {
        return invalid("max_results must be at least 1");
    }
    let max_results = max_results.min(MAX_SOLUTIONS) as usize;

    let finder = match app.finder() {
        Ok(f) => f,
        Err(why) => {
            return ToolOutput::failure(KIND, t0, ErrorCode::NotConfigured, why, request);
        }
    };
    match finder
        .find(&message, tech_stack.as_deref(), max_results)
        .await
    {
        Ok(report) => {
            let markdown = report.to_markdown();
            let mut payload = serde_json::to_value(&report).unwrap_or_else(|_| serde_json::json!({}));
            payload["ok"] = serde_json::json!(true);
            payload["request"] = request;
            ToolOutput::finish(payload, markdown, KIND, t0)
        }
        Err(e) => {
            let code = ErrorCode::for_error(&e, ErrorCode::UnexpectedError);
            ToolOutput::failure(KIND, t0, code, e, request)
        }
    }
}
