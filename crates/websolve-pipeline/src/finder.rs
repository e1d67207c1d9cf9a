//! The orchestrator: parse -> build queries -> search fan-out -> dedup -> fetch fan-out ->
//! score -> rank.

use crate::config::FinderConfig;
use crate::content::{ContentProcessor, ScoredSolution};
use crate::queries::{QueryBuilder, TargetedQuery};
use crate::signals::{ErrorParser, ErrorSignals};
use crate::tables::CompiledTables;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use websolve_core::{
    log_snippet, normalize_url, ContentFetcher, ContentFormat, ContentRequest, Error, Result,
    SearchProvider, SearchQuery, SearchResult,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindStats {
    pub queries_attempted: usize,
    pub queries_failed: usize,
    pub results_seen: usize,
    pub duplicates_dropped: usize,
    pub fetches_attempted: usize,
    pub fetches_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionReport {
    pub error_kind: String,
    pub key_terms: Vec<String>,
    pub tech_stack: Option<String>,
    pub queries: Vec<TargetedQuery>,
    /// Best first; never longer than the requested `max_results`.
    pub solutions: Vec<ScoredSolution>,
    pub stats: FindStats,
}

impl SolutionReport {
    fn empty(signals: &ErrorSignals, queries: Vec<TargetedQuery>) -> Self {
        Self {
            error_kind: signals.error_kind().to_string(),
            key_terms: signals.key_terms().to_vec(),
            tech_stack: signals.tech_stack().map(str::to_string),
            queries,
            solutions: Vec::new(),
            stats: FindStats::default(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Error solutions\n\n");
        out.push_str(&format!("- **error kind**: `{}`\n", self.error_kind));
        if !self.key_terms.is_empty() {
            out.push_str(&format!("- **key terms**: {}\n", self.key_terms.join(", ")));
        }
        if let Some(stack) = &self.tech_stack {
            out.push_str(&format!("- **tech stack**: {stack}\n"));
        }
        out.push_str(&format!(
            "- **queries**: {} ({} failed), **results seen**: {}, **fetched**: {}\n\n",
            self.stats.queries_attempted,
            self.stats.queries_failed,
            self.stats.results_seen,
            self.stats.fetches_attempted
        ));
        if self.solutions.is_empty() {
            out.push_str("_No solutions found._\n");
            return out;
        }
        for (i, s) in self.solutions.iter().enumerate() {
            out.push_str(&format!(
                "## {}. {}\n\n{}\n\n- source: {} | relevance {:.2} | quality {:.2}\n\n{}\n\n",
                i + 1,
                s.title,
                s.url,
                s.source.as_str(),
                s.relevance_score,
                s.quality_score,
                s.summary
            ));
        }
        out
    }
}

enum FetchOutcome {
    Skipped,
    Fetched(String),
    Failed,
}

async fn with_timeout<T>(
    ms: u64,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(Duration::from_millis(ms), fut).await {
        Ok(r) => r,
        Err(_) => Err(Error::Timeout(format!("{what} exceeded {ms}ms"))),
    }
}

/// Finds and ranks candidate fixes for an error message.
///
/// Collaborators are injected as trait objects so tests can substitute fakes. All work for
/// one [`find`](Self::find) call is owned by that call's future: dropping it cancels every
/// outstanding search and fetch.
pub struct ErrorSolutionFinder {
    search: Arc<dyn SearchProvider>,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    parser: ErrorParser,
    builder: QueryBuilder,
    processor: ContentProcessor,
    config: FinderConfig,
}

impl ErrorSolutionFinder {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Option<Arc<dyn ContentFetcher>>,
        config: FinderConfig,
        tables: Arc<CompiledTables>,
    ) -> Self {
        let config = config.normalized();
        Self {
            search,
            fetcher,
            parser: ErrorParser::new(tables.clone(), config.max_key_terms),
            builder: QueryBuilder::new(tables.clone(), config.query_terms),
            processor: ContentProcessor::new(tables, &config),
            config,
        }
    }

    pub fn with_builtin_tables(
        search: Arc<dyn SearchProvider>,
        fetcher: Option<Arc<dyn ContentFetcher>>,
        config: FinderConfig,
    ) -> Self {
        Self::new(search, fetcher, config, CompiledTables::builtin())
    }

    /// Individual search or fetch failures are logged and skipped; they never fail the call.
    /// Only caller mistakes (blank message, `max_results == 0`) are errors, and those are
    /// rejected before any collaborator is touched.
    pub async fn find(
        &self,
        error_message: &str,
        tech_stack: Option<&str>,
        max_results: usize,
    ) -> Result<SolutionReport> {
        if error_message.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "error_message must not be empty".to_string(),
            ));
        }
        if max_results == 0 {
            return Err(Error::InvalidArgument(
                "max_results must be at least 1".to_string(),
            ));
        }

        let signals = self.parser.parse_with_hint(error_message, tech_stack);
        let queries = self.builder.build(&signals);
        tracing::debug!(
            error_kind = signals.error_kind(),
            terms = signals.key_terms().len(),
            queries = queries.len(),
            message = %log_snippet(error_message),
            "finding solutions"
        );
        let mut report = SolutionReport::empty(&signals, queries);
        if report.queries.is_empty() {
            return Ok(report);
        }

        let candidates = self.search_all(&report.queries, &mut report.stats).await;
        let outcomes = self.fetch_all(&candidates, &mut report.stats).await;

        let mut ranked: Vec<(f64, ScoredSolution)> = candidates
            .iter()
            .zip(outcomes.iter())
            .map(|(hit, outcome)| {
                let text = match outcome {
                    FetchOutcome::Fetched(t) => Some(t.as_str()),
                    FetchOutcome::Skipped | FetchOutcome::Failed => None,
                };
                let scored = self.processor.score(hit, &signals, text);
                let combined = self
                    .config
                    .combined_score(scored.relevance_score, scored.quality_score);
                (combined, scored)
            })
            .collect();
        // Stable: ties keep discovery order.
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(max_results);
        report.solutions = ranked.into_iter().map(|(_, s)| s).collect();

        tracing::debug!(
            solutions = report.solutions.len(),
            queries_failed = report.stats.queries_failed,
            fetches_failed = report.stats.fetches_failed,
            "find complete"
        );
        Ok(report)
    }

    /// Run every query (bounded concurrency) and drop URL duplicates. The copy that survives
    /// is the first one by `(query index, rank)`, so earlier queries win. Survivors are then
    /// ordered by `(rank within query, query index)`, which is the discovery order ranking
    /// ties fall back to.
    async fn search_all(
        &self,
        queries: &[TargetedQuery],
        stats: &mut FindStats,
    ) -> Vec<SearchResult> {
        let searches: Vec<_> = queries.iter().map(|q| self.search_one(q)).collect();
        let per_query: Vec<Result<Vec<SearchResult>>> = stream::iter(searches)
            .buffered(self.config.search_concurrency)
            .collect()
            .await;

        stats.queries_attempted = queries.len();
        let mut seen = HashSet::new();
        let mut kept: Vec<(usize, usize, SearchResult)> = Vec::new();
        for (qi, (q, res)) in queries.iter().zip(per_query).enumerate() {
            let hits = match res {
                Ok(hits) => hits,
                Err(e) => {
                    stats.queries_failed += 1;
                    tracing::warn!(
                        search_target = q.target.as_str(),
                        query = %log_snippet(&q.text),
                        error = %e,
                        "search failed; skipping query"
                    );
                    continue;
                }
            };
            for (rank, hit) in hits.into_iter().enumerate() {
                if hit.url.trim().is_empty() {
                    tracing::debug!(search_target = q.target.as_str(), rank, "skipping hit without url");
                    continue;
                }
                stats.results_seen += 1;
                if !seen.insert(normalize_url(&hit.url)) {
                    stats.duplicates_dropped += 1;
                    continue;
                }
                kept.push((rank, qi, hit));
            }
        }
        kept.sort_by_key(|(rank, qi, _)| (*rank, *qi));
        kept.into_iter().map(|(_, _, hit)| hit).collect()
    }

    async fn search_one(&self, q: &TargetedQuery) -> Result<Vec<SearchResult>> {
        let mut sq = SearchQuery::new(q.text.clone());
        sq.max_results = Some(self.config.results_per_query);
        sq.timeout_ms = Some(self.config.search_timeout_ms);
        sq.language = self.config.language.clone();
        let resp = with_timeout(
            self.config.search_timeout_ms,
            "search",
            self.search.search(&sq),
        )
        .await?;
        Ok(resp
            .results
            .into_iter()
            .take(self.config.results_per_query)
            .collect())
    }

    /// One outcome per candidate, same order. Only the first `max_fetches` are fetched.
    async fn fetch_all(&self, candidates: &[SearchResult], stats: &mut FindStats) -> Vec<FetchOutcome> {
        let fetcher = match (&self.fetcher, self.config.fetch_content) {
            (Some(f), true) => f.clone(),
            _ => return candidates.iter().map(|_| FetchOutcome::Skipped).collect(),
        };
        let max_fetches = self.config.max_fetches;
        let fetches: Vec<_> = candidates
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let fetcher = fetcher.clone();
                async move {
                    if i >= max_fetches {
                        return FetchOutcome::Skipped;
                    }
                    match self.fetch_one(fetcher.as_ref(), &hit.url).await {
                        Ok(text) => FetchOutcome::Fetched(text),
                        Err(e) => {
                            tracing::warn!(
                                url = %log_snippet(&hit.url),
                                error = %e,
                                "fetch failed; using snippet"
                            );
                            FetchOutcome::Failed
                        }
                    }
                }
            })
            .collect();
        let outcomes: Vec<FetchOutcome> = stream::iter(fetches)
            .buffered(self.config.fetch_concurrency)
            .collect()
            .await;

        for o in &outcomes {
            match o {
                FetchOutcome::Fetched(_) => stats.fetches_attempted += 1,
                FetchOutcome::Failed => {
                    stats.fetches_attempted += 1;
                    stats.fetches_failed += 1;
                }
                FetchOutcome::Skipped => {}
            }
        }
        outcomes
    }

    async fn fetch_one(&self, fetcher: &dyn ContentFetcher, url: &str) -> Result<String> {
        let mut req = ContentRequest::new(url, ContentFormat::Text);
        req.timeout_ms = Some(self.config.fetch_timeout_ms);
        req.max_bytes = Some(self.config.fetch_max_bytes);
        let page = with_timeout(
            self.config.fetch_timeout_ms,
            "fetch",
            fetcher.fetch_content(&req),
        )
        .await?;
        Ok(page.content)
    }
}
