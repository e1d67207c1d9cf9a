use serde::{Deserialize, Serialize};

/// Tunables for one [`crate::ErrorSolutionFinder`]. All of these are defaults that a caller
/// (or the environment, via [`FinderConfig::from_env`]) may override; none of them is part
/// of the pipeline's contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FinderConfig {
    /// Results requested from each targeted query.
    pub results_per_query: usize,
    pub search_concurrency: usize,
    pub fetch_concurrency: usize,
    /// Only the first N deduplicated candidates (in discovery order) get fetched.
    pub max_fetches: usize,
    pub fetch_content: bool,
    pub search_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub fetch_max_bytes: u64,
    pub language: Option<String>,

    pub relevance_weight: f64,
    pub quality_weight: f64,
    pub trust_weight: f64,
    pub length_weight: f64,
    /// Content length (chars) at which the length factor saturates at 1.0.
    pub length_saturation_chars: usize,

    pub max_key_terms: usize,
    /// Key terms (after the error kind) that go into each query.
    pub query_terms: usize,
    pub max_summary_chars: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            results_per_query: 5,
            search_concurrency: 4,
            fetch_concurrency: 4,
            max_fetches: 8,
            fetch_content: true,
            search_timeout_ms: 15_000,
            fetch_timeout_ms: 10_000,
            fetch_max_bytes: 2_000_000,
            language: None,
            relevance_weight: 0.7,
            quality_weight: 0.3,
            trust_weight: 0.6,
            length_weight: 0.4,
            length_saturation_chars: 2_000,
            max_key_terms: 10,
            query_terms: 5,
            max_summary_chars: 320,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_str(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable env value");
            None
        }
    }
}

fn env_bool(key: &str) -> Option<bool> {
    match env_str(key)?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(key, value = other, "ignoring unparseable env bool");
            None
        }
    }
}

impl FinderConfig {
    /// Defaults overridden by `WEBSOLVE_*` environment variables, then normalized.
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Some(v) = env_parse("WEBSOLVE_RESULTS_PER_QUERY") {
            c.results_per_query = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_SEARCH_CONCURRENCY") {
            c.search_concurrency = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_FETCH_CONCURRENCY") {
            c.fetch_concurrency = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_MAX_FETCHES") {
            c.max_fetches = v;
        }
        if let Some(v) = env_bool("WEBSOLVE_FETCH_CONTENT") {
            c.fetch_content = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_SEARCH_TIMEOUT_MS") {
            c.search_timeout_ms = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_FETCH_TIMEOUT_MS") {
            c.fetch_timeout_ms = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_FETCH_MAX_BYTES") {
            c.fetch_max_bytes = v;
        }
        if let Some(v) = env_str("WEBSOLVE_LANGUAGE") {
            c.language = Some(v);
        }
        if let Some(v) = env_parse("WEBSOLVE_RELEVANCE_WEIGHT") {
            c.relevance_weight = v;
        }
        if let Some(v) = env_parse("WEBSOLVE_QUALITY_WEIGHT") {
            c.quality_weight = v;
        }
        c.normalized()
    }

    /// Clamp everything into a usable range: concurrency >= 1, non-negative finite weights.
    /// Relevance must outweigh quality; a pair that inverts that falls back to the defaults.
    pub fn normalized(mut self) -> Self {
        self.results_per_query = self.results_per_query.clamp(1, 50);
        self.search_concurrency = self.search_concurrency.max(1);
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.search_timeout_ms = self.search_timeout_ms.max(1);
        self.fetch_timeout_ms = self.fetch_timeout_ms.max(1);
        self.max_key_terms = self.max_key_terms.max(1);
        self.length_saturation_chars = self.length_saturation_chars.max(1);
        for w in [
            &mut self.relevance_weight,
            &mut self.quality_weight,
            &mut self.trust_weight,
            &mut self.length_weight,
        ] {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
            }
        }
        if self.quality_weight > self.relevance_weight {
            tracing::warn!(
                relevance_weight = self.relevance_weight,
                quality_weight = self.quality_weight,
                "quality weight exceeds relevance weight; using default weights"
            );
            let defaults = Self::default();
            self.relevance_weight = defaults.relevance_weight;
            self.quality_weight = defaults.quality_weight;
        }
        self
    }

    /// Weighted mean of relevance and quality. Both inputs are in [0,1], so is the output.
    pub fn combined_score(&self, relevance: f64, quality: f64) -> f64 {
        let total = self.relevance_weight + self.quality_weight;
        if total <= 0.0 {
            return 0.0;
        }
        ((self.relevance_weight * relevance + self.quality_weight * quality) / total)
            .clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_score_is_weighted_mean() {
        let c = FinderConfig::default();
        let s = c.combined_score(1.0, 0.0);
        assert!((s - 0.7).abs() < 1e-9);
        let s = c.combined_score(0.5, 0.5);
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn normalized_repairs_degenerate_values() {
        let c = FinderConfig {
            search_concurrency: 0,
            fetch_concurrency: 0,
            results_per_query: 0,
            relevance_weight: f64::NAN,
            quality_weight: -1.0,
            ..FinderConfig::default()
        }
        .normalized();
        assert_eq!(c.search_concurrency, 1);
        assert_eq!(c.fetch_concurrency, 1);
        assert_eq!(c.results_per_query, 1);
        assert_eq!(c.relevance_weight, 0.0);
        assert_eq!(c.quality_weight, 0.0);
        assert_eq!(c.combined_score(1.0, 1.0), 0.0);
    }

    #[test]
    fn inverted_weights_fall_back_to_defaults() {
        let c = FinderConfig {
            relevance_weight: 0.2,
            quality_weight: 0.8,
            ..FinderConfig::default()
        }
        .normalized();
        assert_eq!(c.relevance_weight, 0.7);
        assert_eq!(c.quality_weight, 0.3);

        let c = FinderConfig {
            relevance_weight: 0.5,
            quality_weight: 0.5,
            ..FinderConfig::default()
        }
        .normalized();
        assert_eq!(c.relevance_weight, 0.5);
        assert_eq!(c.quality_weight, 0.5);
    }
}
