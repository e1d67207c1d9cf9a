use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use websolve_core::{
    log_snippet, Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult,
};

use crate::config::{BasicAuth, LocalConfig};

/// Hard cap on results returned from one SearXNG page, whatever the caller asks for.
pub const MAX_RESULTS_CAP: usize = 50;

const MIN_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct SearxngSearchProvider {
    client: reqwest::Client,
    endpoints: Vec<String>,
    auth: Option<BasicAuth>,
    default_timeout: Duration,
}

impl SearxngSearchProvider {
    pub fn new(
        client: reqwest::Client,
        endpoints: Vec<String>,
        auth: Option<BasicAuth>,
        default_timeout: Duration,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::NotConfigured(
                "missing SEARXNG_URL (or WEBSOLVE_SEARXNG_ENDPOINTS)".to_string(),
            ));
        }
        Ok(Self {
            client,
            endpoints,
            auth,
            default_timeout,
        })
    }

    pub fn from_config(cfg: &LocalConfig) -> Result<Self> {
        let client = crate::build_client(cfg)?;
        Self::new(
            client,
            cfg.searxng_endpoints.clone(),
            cfg.auth.clone(),
            cfg.search_timeout,
        )
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(&LocalConfig::from_env()?)
    }

    fn endpoint_search_for(base_endpoint: &str) -> String {
        // Accept either a base URL (…/), or a full /search endpoint.
        let mut base = base_endpoint.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }

    fn stable_hash64(query: &SearchQuery) -> u64 {
        // FNV-1a; stable across runs, unlike HashMap's RandomState.
        let mut h: u64 = 1469598103934665603;
        let lang = query.language.as_deref().unwrap_or("");
        for b in query.query.bytes().chain(lang.bytes()) {
            h ^= b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        h
    }

    fn pick_endpoint_index(&self, q: &SearchQuery) -> usize {
        if self.endpoints.is_empty() {
            return 0;
        }
        (Self::stable_hash64(q) as usize) % self.endpoints.len()
    }

    fn timeout_for(&self, q: &SearchQuery) -> Duration {
        q.timeout()
            .unwrap_or(self.default_timeout)
            .clamp(MIN_TIMEOUT, MAX_TIMEOUT)
    }
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
    number_of_results: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    // SearXNG uses `content` for snippets in JSON format.
    content: Option<String>,
    engine: Option<String>,
}

fn search_err(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("searxng search: {e}"))
    } else {
        Error::Search(e.to_string())
    }
}

#[async_trait::async_trait]
impl SearchProvider for SearxngSearchProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max_results = q.max_results.unwrap_or(MAX_RESULTS_CAP).min(MAX_RESULTS_CAP);
        let idx = self.pick_endpoint_index(q);
        let endpoint = Self::endpoint_search_for(&self.endpoints[idx]);
        tracing::debug!(
            query = %log_snippet(&q.query),
            endpoint = %endpoint,
            page = q.page,
            "searxng search"
        );

        let page = q.page.max(1).to_string();
        let safesearch = q.safesearch.level().to_string();
        let mut req = self.client.get(&endpoint).query(&[
            ("q", q.query.as_str()),
            ("format", "json"),
            ("pageno", page.as_str()),
            ("safesearch", safesearch.as_str()),
        ]);
        if let Some(tr) = q.time_range {
            req = req.query(&[("time_range", tr.as_str())]);
        }
        if let Some(lang) = q.language.as_deref().filter(|l| !l.trim().is_empty()) {
            req = req.query(&[("language", lang)]);
        }
        if let Some(auth) = &self.auth {
            req = req.basic_auth(&auth.username, Some(&auth.password));
        }

        let resp = req
            .timeout(self.timeout_for(q))
            .send()
            .await
            .map_err(search_err)?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                query = %log_snippet(&q.query),
                "searxng returned an error status"
            );
            return Err(Error::Search(format!("searxng search HTTP {status}")));
        }

        let parsed: SearxngSearchResponse = resp.json().await.map_err(search_err)?;

        let mut out = Vec::new();
        for r in parsed.results.unwrap_or_default() {
            if out.len() >= max_results {
                break;
            }
            let Some(url) = r.url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            out.push(SearchResult {
                url,
                title: r.title,
                snippet: r.content,
                source: r.engine.unwrap_or_else(|| "searxng".to_string()),
            });
        }

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        tracing::debug!(results = out.len(), "searxng search done");

        Ok(SearchResponse {
            results: out,
            provider: "searxng".to_string(),
            total_hint: parsed
                .number_of_results
                .filter(|n| n.is_finite() && *n > 0.0)
                .map(|n| n as u64),
            timings_ms,
        })
    }
}
