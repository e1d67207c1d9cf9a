use std::sync::Arc;
use websolve_core::{ContentFetcher, SearchProvider};
use websolve_local::{LocalConfig, PageFetcher, SearxngSearchProvider};
use websolve_pipeline::{CompiledTables, ErrorSolutionFinder, FinderConfig};

/// Collaborators and settings shared by every tool call, built once at startup.
pub(crate) struct App {
    search: Option<Arc<dyn SearchProvider>>,
    /// Why `search` is `None`.
    search_unavailable: String,
    pages: Arc<dyn ContentFetcher>,
    finder_config: FinderConfig,
    tables: Arc<CompiledTables>,
}

impl App {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let local = LocalConfig::from_env()?;
        let pages = PageFetcher::new(&local)?;
        let (search, search_unavailable) = match SearxngSearchProvider::from_config(&local) {
            Ok(p) => (Some(Arc::new(p) as Arc<dyn SearchProvider>), String::new()),
            Err(e) => {
                tracing::warn!(error = %e, "search is disabled");
                (None, e.to_string())
            }
        };
        let tables = CompiledTables::from_env()?;
        Ok(Self {
            search,
            search_unavailable,
            pages: Arc::new(pages),
            finder_config: FinderConfig::from_env(),
            tables,
        })
    }

    #[cfg(test)]
    pub(crate) fn new(
        search: Option<Arc<dyn SearchProvider>>,
        pages: Arc<dyn ContentFetcher>,
        finder_config: FinderConfig,
    ) -> Self {
        Self {
            search,
            search_unavailable: "search provider not configured".to_string(),
            pages,
            finder_config,
            tables: CompiledTables::builtin(),
        }
    }

    pub(crate) fn search(&self) -> Result<&Arc<dyn SearchProvider>, &str> {
        self.search.as_ref().ok_or(self.search_unavailable.as_str())
    }

    pub(crate) fn pages(&self) -> &Arc<dyn ContentFetcher> {
        &self.pages
    }

    /// A finder over the configured search provider; page fetching follows `fetch_content`.
    pub(crate) fn finder(&self) -> Result<ErrorSolutionFinder, &str> {
        let search = self.search()?.clone();
        let fetcher = self
            .finder_config
            .fetch_content
            .then(|| self.pages.clone());
        Ok(ErrorSolutionFinder::new(
            search,
            fetcher,
            self.finder_config.clone(),
            self.tables.clone(),
        ))
    }
}
