use websolve_core::{
    log_snippet, ContentFetcher, ContentRequest, Error, FetchBackend, FetchRequest, PageContent,
    Result,
};

use crate::config::LocalConfig;
use crate::extract;
use crate::LocalFetcher;

/// [`ContentFetcher`] over [`LocalFetcher`]: size limit, status check, then format conversion.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    fetcher: LocalFetcher,
    max_content_size: u64,
    strict_size: bool,
}

impl PageFetcher {
    pub fn new(cfg: &LocalConfig) -> Result<Self> {
        Ok(Self {
            fetcher: LocalFetcher::new(cfg)?,
            max_content_size: cfg.max_content_size,
            strict_size: true,
        })
    }

    /// When off, bodies over the size limit are cut instead of rejected.
    pub fn with_strict_size(mut self, strict: bool) -> Self {
        self.strict_size = strict;
        self
    }
}

fn too_large(size: u64, limit: u64) -> Error {
    Error::Fetch(format!(
        "Content too large ({size} bytes). Maximum allowed size is {limit} bytes."
    ))
}

#[async_trait::async_trait]
impl ContentFetcher for PageFetcher {
    async fn fetch_content(&self, req: &ContentRequest) -> Result<PageContent> {
        let limit = self.max_content_size;
        // A caller cap below the limit means "give me a prefix", never an error.
        let caller_cap = req.max_bytes.filter(|m| *m < limit);
        let enforce = caller_cap.is_none() && self.strict_size;
        let read_cap = match caller_cap {
            Some(m) => m,
            None if enforce => limit.saturating_add(1),
            None => limit,
        };

        let resp = self
            .fetcher
            .fetch(&FetchRequest {
                url: req.url.clone(),
                timeout_ms: req.timeout_ms,
                max_bytes: Some(read_cap),
                headers: req.headers.clone(),
            })
            .await?;

        if resp.status >= 400 {
            tracing::debug!(status = resp.status, url = %log_snippet(&req.url), "fetch HTTP error");
            return Err(Error::Fetch(format!("HTTP {}", resp.status)));
        }
        if enforce && resp.bytes.len() as u64 > limit {
            let declared = resp
                .headers
                .get("content-length")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(resp.bytes.len() as u64);
            tracing::warn!(size = declared, limit, "content exceeds size limit");
            return Err(too_large(declared, limit));
        }

        let converted = extract::convert(
            &resp.bytes,
            resp.content_type.as_deref(),
            &req.url,
            req.format,
            req.raw,
            resp.truncated,
        )?;

        Ok(PageContent {
            url: req.url.clone(),
            final_url: resp.final_url,
            format: req.format,
            title: converted.title,
            content: converted.content,
            content_type: resp.content_type,
            body_bytes: resp.bytes.len(),
            truncated: resp.truncated,
        })
    }
}
