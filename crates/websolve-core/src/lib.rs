use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("malformed content: {0}")]
    MalformedContent(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(Error::InvalidArgument(format!(
                "unknown time_range {other:?} (allowed: day, week, month, year)"
            ))),
        }
    }
}

/// SearXNG safe-search level: 0 (off), 1 (moderate), 2 (strict).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    #[default]
    Off,
    Moderate,
    Strict,
}

impl SafeSearch {
    pub fn level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Moderate => 1,
            Self::Strict => 2,
        }
    }

    pub fn from_level(level: i64) -> Result<Self> {
        match level {
            0 => Ok(Self::Off),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::Strict),
            other => Err(Error::InvalidArgument(format!(
                "safesearch must be 0, 1 or 2 (got {other})"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// 1-based result page.
    pub page: u32,
    pub time_range: Option<TimeRange>,
    pub language: Option<String>,
    pub safesearch: SafeSearch,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            time_range: None,
            language: None,
            safesearch: SafeSearch::Off,
            max_results: None,
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    /// Engine or provider that produced this hit.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    /// Backend-reported total match count, when it reports one.
    pub total_hint: Option<u64>,
    pub timings_ms: BTreeMap<String, u128>,
}

/// A metasearch backend. Zero matches is `Ok` with an empty result list, never an error.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    /// Optional headers to add (best-effort; adapter may drop unsafe headers).
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Markdown,
    Html,
    Text,
    Json,
}

impl ContentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl FromStr for ContentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidArgument(format!(
                "unknown format {other:?} (allowed: markdown, html, text, json)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub url: String,
    pub format: ContentFormat,
    /// Return the body as fetched, skipping HTML cleanup/conversion.
    pub raw: bool,
    pub timeout_ms: Option<u64>,
    pub max_bytes: Option<u64>,
    /// Extra request headers. Credential-bearing ones are subject to the fetcher's header policy.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ContentRequest {
    pub fn new(url: impl Into<String>, format: ContentFormat) -> Self {
        Self {
            url: url.into(),
            format,
            raw: false,
            timeout_ms: None,
            max_bytes: None,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub final_url: String,
    pub format: ContentFormat,
    pub title: Option<String>,
    pub content: String,
    pub content_type: Option<String>,
    /// Size of the fetched body in bytes (before conversion).
    pub body_bytes: usize,
    /// The collaborator cut the body at its size limit; `content` covers a prefix only.
    pub truncated: bool,
}

/// Fetch a page and hand back converted text (the "fetch collaborator").
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_content(&self, req: &ContentRequest) -> Result<PageContent>;
}

/// Dedup key for result URLs: scheme, host and path only.
///
/// - scheme and host are lower-cased
/// - query string and fragment are dropped
/// - a trailing `/` is dropped from non-root paths
///
/// Unparseable input falls back to the lower-cased string cut at the first `?` or `#`.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(u) if u.has_host() => {
            let mut path = u.path().to_string();
            while path.len() > 1 && path.ends_with('/') {
                path.pop();
            }
            let port = u.port().map(|p| format!(":{p}")).unwrap_or_default();
            format!(
                "{}://{}{}{}",
                u.scheme(),
                u.host_str().unwrap_or_default().to_ascii_lowercase(),
                port,
                path
            )
        }
        _ => {
            let cut = trimmed
                .find(|c: char| c == '?' || c == '#')
                .map(|i| &trimmed[..i])
                .unwrap_or(trimmed);
            cut.to_lowercase()
        }
    }
}

/// User-supplied text (queries, URLs) is cut to this many chars before it reaches a log line.
pub const MAX_LOG_CHARS: usize = 100;

/// Truncate user-supplied text for logging.
pub fn log_snippet(s: &str) -> String {
    if s.chars().count() <= MAX_LOG_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_LOG_CHARS).collect();
    out.push('…');
    out
}

/// Lower-cased host of a URL with a leading `www.` removed.
pub fn url_domain(raw: &str) -> Option<String> {
    let u = url::Url::parse(raw.trim()).ok()?;
    let host = u.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
