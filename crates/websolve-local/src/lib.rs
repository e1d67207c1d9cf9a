use std::collections::BTreeMap;
use std::time::Duration;
use websolve_core::{Error, FetchBackend, FetchRequest, FetchResponse, Result};

pub mod config;
pub mod extract;
pub mod page;
pub mod safety;
pub mod search;

pub use config::{BasicAuth, LocalConfig};
pub use page::PageFetcher;
pub use search::SearxngSearchProvider;

const USER_AGENT: &str = concat!("websolve-local/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// Shared reqwest client: bounded connect/overall timeouts, optional proxy and a redirect
/// policy that re-checks every hop against the private-address guard.
pub fn build_client(cfg: &LocalConfig) -> Result<reqwest::Client> {
    let allow_private = cfg.allow_private_urls;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("stopped after {MAX_REDIRECTS} redirects"));
        }
        if !allow_private {
            if let Err(e) = safety::check_parsed(attempt.url()) {
                return attempt.error(e.to_string());
            }
        }
        attempt.follow()
    });

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(policy)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30));
    if let Some(proxy) = cfg.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| Error::InvalidUrl(format!("bad proxy url: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| Error::Fetch(e.to_string()))
}

pub(crate) fn map_reqwest_err(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Fetch(e.to_string())
    }
}

/// Raw HTTP GET with streamed truncation. Conversion lives in [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    allow_private_urls: bool,
    allow_unsafe_headers: bool,
}

impl LocalFetcher {
    pub fn new(cfg: &LocalConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(cfg)?,
            allow_private_urls: cfg.allow_private_urls,
            allow_unsafe_headers: cfg.allow_unsafe_headers,
        })
    }

    fn is_sensitive_request_header(name: &reqwest::header::HeaderName) -> bool {
        // HeaderName::as_str() is canonical lower-case.
        matches!(
            name.as_str(),
            "authorization" | "cookie" | "proxy-authorization"
        )
    }

    fn apply_headers(
        &self,
        mut rb: reqwest::RequestBuilder,
        headers: &BTreeMap<String, String>,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                if !self.allow_unsafe_headers && Self::is_sensitive_request_header(&name) {
                    tracing::debug!(header = name.as_str(), "dropping sensitive request header");
                    continue;
                }
                rb = rb.header(name, value);
            }
        }
        rb
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let mut timings_ms = BTreeMap::new();
        let t_req = std::time::Instant::now();
        let url = safety::check_url(&req.url, self.allow_private_urls)?;

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = self.apply_headers(rb, &req.headers);
        let resp = rb.send().await.map_err(map_reqwest_err)?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.as_str().to_string(), s.to_string());
            }
        }

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_err)?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        timings_ms.insert("network_fetch".to_string(), t_req.elapsed().as_millis());
        tracing::debug!(
            status,
            bytes = bytes.len(),
            truncated,
            elapsed_ms = t_req.elapsed().as_millis() as u64,
            "fetched"
        );
        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status,
            content_type,
            headers,
            bytes,
            truncated,
            timings_ms,
        })
    }
}
