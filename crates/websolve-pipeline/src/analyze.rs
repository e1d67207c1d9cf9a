//! Heuristic analysis of a batch of search results (summary, trends, sources, keywords,
//! relevance). Pure and synchronous; the output is a JSON object per analysis kind.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::OnceLock;
use websolve_core::{url_domain, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    #[default]
    Summary,
    Trends,
    Sources,
    Keywords,
    Relevance,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Trends => "trends",
            Self::Sources => "sources",
            Self::Keywords => "keywords",
            Self::Relevance => "relevance",
        }
    }
}

impl FromStr for AnalysisKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "trends" => Ok(Self::Trends),
            "sources" => Ok(Self::Sources),
            "keywords" => Ok(Self::Keywords),
            "relevance" => Ok(Self::Relevance),
            other => Err(Error::InvalidArgument(format!(
                "unsupported analysis type: {other}"
            ))),
        }
    }
}

/// One search hit as handed to the analyzer. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzedResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "up", "about", "into", "through", "during", "before", "after", "above", "below",
    "between", "among", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "must",
    "can", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they",
    "them", "their", "what", "which", "who", "when", "where", "why", "how", "all", "each",
    "every", "some", "any", "few", "more", "most", "other", "such", "no", "not", "only", "own",
    "same", "so", "than", "too", "very", "just", "now",
];

const CREDIBLE_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "github.com",
    "stackoverflow.com",
    "medium.com",
    "techcrunch.com",
    "bbc.com",
    "cnn.com",
    "reuters.com",
    "apnews.com",
    "nature.com",
    "science.org",
    "arxiv.org",
    "ieee.org",
    "acm.org",
];
const LOW_CREDIBILITY_DOMAINS: &[&str] = &["clickbait.com", "fakenews.com", "unreliablesource.com"];

const RECENT_WORDS: &[&str] = &["recent", "latest", "new", "now", "today", "current", "breaking"];
const HISTORICAL_WORDS: &[&str] = &["history", "historical", "past", "former", "previous", "old"];
const TIME_WORDS: &[&str] = &["deadline", "schedule", "timeline", "date", "when", "soon", "upcoming"];
const FRESH_WORDS: &[&str] = &["2023", "2024", "2025", "2026", "recently", "just", "new", "latest"];
const EVERGREEN_WORDS: &[&str] = &[
    "guide",
    "tutorial",
    "how to",
    "basics",
    "fundamentals",
    "introduction",
];
const OUTDATED_WORDS: &[&str] = &["2020", "2021", "2022", "old", "previous", "former"];

fn word_re(min: usize) -> &'static Regex {
    static MIN3: OnceLock<Regex> = OnceLock::new();
    static MIN4: OnceLock<Regex> = OnceLock::new();
    if min >= 4 {
        MIN4.get_or_init(|| Regex::new(r"\b[a-z]{4,}\b").expect("word regex must compile"))
    } else {
        MIN3.get_or_init(|| Regex::new(r"\b[a-z]{3,}\b").expect("word regex must compile"))
    }
}

/// Occurrence counts that remember first-seen order, so ties rank deterministically.
#[derive(Debug, Default)]
struct Counter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Counter {
    fn count<I: IntoIterator<Item = String>>(items: I) -> Self {
        let mut c = Self::default();
        for item in items {
            match c.counts.get_mut(&item) {
                Some(n) => *n += 1,
                None => {
                    c.counts.insert(item.clone(), 1);
                    c.order.push(item);
                }
            }
        }
        c
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        let mut all: Vec<(String, usize)> = self
            .order
            .iter()
            .map(|k| (k.clone(), self.counts.get(k).copied().unwrap_or(0)))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1));
        all.truncate(n);
        all
    }

    fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order
            .iter()
            .map(|k| (k.as_str(), self.counts.get(k).copied().unwrap_or(0)))
    }
}

fn pairs(v: &[(String, usize)]) -> Value {
    Value::Array(v.iter().map(|(k, n)| json!([k, n])).collect())
}

#[derive(Debug, Clone)]
pub struct ResultAnalyzer {
    pub max_results: usize,
    pub min_keyword_freq: usize,
    stopwords: HashSet<&'static str>,
}

impl Default for ResultAnalyzer {
    fn default() -> Self {
        Self::new(10, 2)
    }
}

impl ResultAnalyzer {
    pub fn new(max_results: usize, min_keyword_freq: usize) -> Self {
        Self {
            max_results: max_results.max(1),
            min_keyword_freq: min_keyword_freq.max(1),
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// An empty batch is not an error: it yields `{"error": ...}` like the other shapes do.
    pub fn analyze(&self, results: &[AnalyzedResult], kind: AnalysisKind) -> Value {
        if results.is_empty() {
            return json!({"error": "No search results provided for analysis"});
        }
        let results = &results[..results.len().min(self.max_results)];
        tracing::debug!(kind = kind.as_str(), n = results.len(), "analyzing results");
        match kind {
            AnalysisKind::Summary => self.summary(results),
            AnalysisKind::Trends => self.trends(results),
            AnalysisKind::Sources => self.sources(results),
            AnalysisKind::Keywords => self.keywords(results),
            AnalysisKind::Relevance => self.relevance(results),
        }
    }

    fn summary(&self, results: &[AnalyzedResult]) -> Value {
        let total = results.len();
        let domains = domains(results);
        let domain_counts = Counter::count(domains.iter().cloned());
        let unique = domain_counts.len();
        let keywords = Counter::count(self.keywords_of(results));
        let top_keywords = keywords.most_common(10);
        let themes = self.themes(results);

        let mut insights = Vec::new();
        if total < 5 {
            insights.push("Limited number of results available for comprehensive analysis".to_string());
        }
        if unique == 1 {
            insights.push("All results from single domain - limited source diversity".to_string());
        }
        if !themes.is_empty() {
            let head: Vec<&str> = themes.iter().take(3).map(String::as_str).collect();
            insights.push(format!("Primary themes identified: {}", head.join(", ")));
        }
        if let Some((kw, n)) = top_keywords.first() {
            if *n as f64 > total as f64 * 0.5 {
                insights.push(format!("Dominant keyword: '{kw}' appears in majority of results"));
            }
        }

        json!({
            "analysis_type": "summary",
            "metrics": {
                "total_results": total,
                "unique_domains": unique,
                "domain_diversity": unique as f64 / total as f64,
                "coverage_score": coverage(results),
            },
            "themes": themes,
            "top_keywords": top_keywords
                .iter()
                .map(|(k, n)| json!({"keyword": k, "frequency": n}))
                .collect::<Vec<_>>(),
            "top_domains": pairs(&domain_counts.most_common(5)),
            "insights": insights,
        })
    }

    fn trends(&self, results: &[AnalyzedResult]) -> Value {
        let mut recent = 0;
        let mut historical = 0;
        let mut time_sensitive = 0;
        let mut fresh = 0;
        let mut evergreen = 0;
        let mut outdated = 0;
        for r in results {
            let text = format!("{} {}", r.title, r.content).to_lowercase();
            let any = |words: &[&str]| words.iter().any(|w| text.contains(*w));
            recent += usize::from(any(RECENT_WORDS));
            historical += usize::from(any(HISTORICAL_WORDS));
            time_sensitive += usize::from(any(TIME_WORDS));
            fresh += usize::from(any(FRESH_WORDS));
            evergreen += usize::from(any(EVERGREEN_WORDS));
            outdated += usize::from(any(OUTDATED_WORDS));
        }
        let topics = Counter::count(self.keywords_of(results)).most_common(15);

        let mut insights = Vec::new();
        let recent_in_content = results
            .iter()
            .filter(|r| {
                let c = r.content.to_lowercase();
                ["recent", "latest", "new", "now"].iter().any(|w| c.contains(*w))
            })
            .count();
        if recent_in_content as f64 > results.len() as f64 * 0.5 {
            insights.push("Majority of results contain recent/timely information".to_string());
        }
        if let Some((kw, _)) = topics.first() {
            insights.push(format!("Trending topic: '{kw}' appears most frequently"));
        }

        json!({
            "analysis_type": "trends",
            "temporal_patterns": {
                "recent_indicators": recent,
                "historical_references": historical,
                "time_sensitive_content": time_sensitive,
            },
            "emerging_topics": topics
                .iter()
                .map(|(k, n)| json!({"topic": k, "score": n}))
                .collect::<Vec<_>>(),
            "freshness_indicators": {
                "fresh_content": fresh,
                "evergreen_content": evergreen,
                "outdated_indicators": outdated,
            },
            "trend_insights": insights,
        })
    }

    fn sources(&self, results: &[AnalyzedResult]) -> Value {
        let domains = domains(results);
        let counts = Counter::count(domains.iter().cloned());
        let total = domains.len();

        let distribution = if total == 0 {
            json!({})
        } else {
            let max = counts.iter().map(|(_, n)| n).max().unwrap_or(0);
            let mut dist = Map::new();
            for (d, n) in counts.iter() {
                dist.insert(d.to_string(), json!(n));
            }
            json!({
                "total_domains": total,
                "unique_domains": counts.len(),
                "domain_concentration": max as f64 / total as f64,
                "top_domains": pairs(&counts.most_common(10)),
                "domain_distribution": dist,
            })
        };

        let scored: Vec<(String, f64)> = counts
            .iter()
            .map(|(d, _)| (d.to_string(), credibility(d)))
            .collect();
        let mut credibility_scores = Map::new();
        for (d, s) in &scored {
            credibility_scores.insert(d.clone(), json!(s));
        }

        let diversity = if total == 0 {
            json!({"diversity_score": 0.0, "concentration_ratio": 0.0})
        } else {
            let hhi: f64 = counts
                .iter()
                .map(|(_, n)| (n as f64 / total as f64).powi(2))
                .sum();
            let top3: usize = counts.most_common(3).iter().map(|(_, n)| n).sum();
            json!({
                "diversity_score": 1.0 - hhi,
                "concentration_ratio": top3 as f64 / total as f64,
                "unique_source_ratio": counts.len() as f64 / total as f64,
            })
        };

        let high: Vec<&str> = scored
            .iter()
            .filter(|(_, s)| *s >= 0.8)
            .map(|(d, _)| d.as_str())
            .collect();
        let low: Vec<&str> = scored
            .iter()
            .filter(|(_, s)| *s < 0.4)
            .map(|(d, _)| d.as_str())
            .collect();
        let mut recs = Vec::new();
        if !high.is_empty() {
            recs.push(format!(
                "High credibility sources: {}",
                high.iter().take(3).copied().collect::<Vec<_>>().join(", ")
            ));
        }
        if !low.is_empty() {
            recs.push(format!("Consider verifying information from: {}", low.join(", ")));
        }
        if high.is_empty() && !scored.is_empty() {
            recs.push("Mixed source credibility - cross-verification recommended".to_string());
        }

        json!({
            "analysis_type": "sources",
            "domain_distribution": distribution,
            "credibility_scores": credibility_scores,
            "diversity_metrics": diversity,
            "source_recommendations": recs,
        })
    }

    fn keywords(&self, results: &[AnalyzedResult]) -> Value {
        let counts = Counter::count(self.keywords_of(results));
        let kept: Vec<(&str, usize)> = counts
            .iter()
            .filter(|(_, n)| *n >= self.min_keyword_freq)
            .collect();

        let mut frequency = Map::new();
        for (k, n) in &kept {
            frequency.insert(k.to_string(), json!(n));
        }

        // Crude clustering: keywords sharing their first four letters.
        let mut cluster_order: Vec<String> = Vec::new();
        let mut clusters: HashMap<String, Vec<String>> = HashMap::new();
        for (k, _) in &kept {
            let key: String = k.chars().take(4).collect();
            clusters
                .entry(key.clone())
                .or_insert_with(|| {
                    cluster_order.push(key.clone());
                    Vec::new()
                })
                .push(k.to_string());
        }
        let mut cluster_map = Map::new();
        for key in &cluster_order {
            if let Some(members) = clusters.get(key).filter(|m| m.len() > 1) {
                cluster_map.insert(key.clone(), json!(members));
            }
        }

        let mut importance = Map::new();
        if let Some(max) = kept.iter().map(|(_, n)| *n).max() {
            let n_results = results.len() as f64;
            for (k, n) in &kept {
                let score = (*n as f64 / max as f64) * 0.7 + (*n as f64 / n_results) * 0.3;
                importance.insert(k.to_string(), json!((score * 1000.0).round() / 1000.0));
            }
        }

        let mut insights = Vec::new();
        if let Some((top, _)) = kept.iter().fold(None::<(&str, usize)>, |best, &(k, n)| match best {
            Some((_, bn)) if bn >= n => best,
            _ => Some((k, n)),
        }) {
            insights.push(format!("Most prominent keyword: '{top}'"));
        }
        if !cluster_map.is_empty() {
            insights.push(format!(
                "Identified {} keyword clusters showing related topics",
                cluster_map.len()
            ));
        }
        if kept.len() > 20 {
            insights.push("High keyword diversity suggests broad topic coverage".to_string());
        } else if kept.len() < 5 {
            insights.push("Low keyword diversity indicates focused topic coverage".to_string());
        }

        json!({
            "analysis_type": "keywords",
            "keyword_frequency": frequency,
            "keyword_clusters": cluster_map,
            "importance_scores": importance,
            "keyword_insights": insights,
        })
    }

    fn relevance(&self, results: &[AnalyzedResult]) -> Value {
        let rel: Vec<f64> = results.iter().map(result_relevance).collect();
        let qual: Vec<f64> = results.iter().map(result_quality).collect();
        let avg = |v: &[f64]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            }
        };
        let avg_rel = avg(&rel);
        let avg_qual = avg(&qual);

        let high = rel.iter().filter(|&&s| s >= 0.8).count();
        let medium = rel.iter().filter(|&&s| (0.5..0.8).contains(&s)).count();
        let low = rel.len() - high - medium;

        let mut insights = Vec::new();
        if avg_rel > 0.7 {
            insights.push("High average relevance across results");
        } else if avg_rel < 0.4 {
            insights.push("Low average relevance - consider refining search query");
        }
        if avg_qual > 0.7 {
            insights.push("High content quality observed in results");
        } else if avg_qual < 0.4 {
            insights.push("Variable content quality - verify critical information");
        }

        json!({
            "analysis_type": "relevance",
            "relevance_scores": rel,
            "quality_metrics": qual,
            "average_relevance": avg_rel,
            "average_quality": avg_qual,
            "relevance_distribution": {
                "high_relevance": high,
                "medium_relevance": medium,
                "low_relevance": low,
            },
            "quality_insights": insights,
        })
    }

    fn keywords_of(&self, results: &[AnalyzedResult]) -> Vec<String> {
        let re = word_re(3);
        let mut out = Vec::new();
        for r in results {
            for field in [&r.title, &r.content] {
                let lower = field.to_lowercase();
                out.extend(
                    re.find_iter(&lower)
                        .map(|m| m.as_str())
                        .filter(|w| !self.stopwords.contains(w))
                        .map(str::to_string),
                );
            }
        }
        out
    }

    /// Title words (4+ letters) that recur at least twice; top five.
    fn themes(&self, results: &[AnalyzedResult]) -> Vec<String> {
        let re = word_re(4);
        let words = results.iter().flat_map(|r| {
            let lower = r.title.to_lowercase();
            re.find_iter(&lower)
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        });
        Counter::count(words.filter(|w| !self.stopwords.contains(w.as_str())))
            .most_common(5)
            .into_iter()
            .filter(|(_, n)| *n >= 2)
            .map(|(w, _)| w)
            .collect()
    }
}

fn domains(results: &[AnalyzedResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| !r.url.is_empty())
        .filter_map(|r| url_domain(&r.url))
        .collect()
}

fn coverage(results: &[AnalyzedResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| {
            let mut s = 0.0;
            if !r.title.is_empty() {
                s += 0.3;
            }
            if !r.url.is_empty() {
                s += 0.2;
            }
            if r.content.chars().count() > 50 {
                s += 0.5;
            }
            s
        })
        .sum();
    total / results.len() as f64
}

fn credibility(domain: &str) -> f64 {
    if CREDIBLE_DOMAINS.contains(&domain) {
        0.9
    } else if LOW_CREDIBILITY_DOMAINS.contains(&domain) {
        0.2
    } else if [".edu", ".gov", ".org"].iter().any(|t| domain.contains(t)) {
        0.8
    } else if [".com", ".net", ".co"].iter().any(|t| domain.contains(t)) {
        0.6
    } else {
        0.5
    }
}

fn result_relevance(r: &AnalyzedResult) -> f64 {
    let len = r.content.chars().count();
    let mut s = 0.0;
    if !r.title.is_empty() {
        s += 0.3;
    }
    if len > 100 {
        s += 0.2;
    }
    if len > 300 {
        s += 0.2;
    }
    if r.url.starts_with("http://") || r.url.starts_with("https://") {
        s += 0.1;
    }
    let distinct: HashSet<&str> = r.content.split_whitespace().collect();
    if distinct.len() > 20 {
        s += 0.2;
    }
    f64::min(s, 1.0)
}

fn result_quality(r: &AnalyzedResult) -> f64 {
    if r.content.is_empty() {
        return 0.0;
    }
    let len = r.content.chars().count();
    let mut q = 0.0;
    if (50..=1000).contains(&len) {
        q += 0.3;
    } else if (1001..=3000).contains(&len) {
        q += 0.4;
    }
    if r.content.split('.').count() > 3 {
        q += 0.2;
    }
    if r.content.split_whitespace().count() > 20 {
        q += 0.2;
    }
    if r.content.contains([',', ';', ':', '-']) {
        q += 0.1;
    }
    f64::min(q, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(title: &str, url: &str, content: &str) -> AnalyzedResult {
        AnalyzedResult {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }

    fn batch() -> Vec<AnalyzedResult> {
        vec![
            r(
                "Python requests tutorial",
                "https://www.github.com/psf/requests",
                "Install requests with pip. The latest release adds retries.",
            ),
            r(
                "Handling requests timeouts in Python",
                "https://stackoverflow.com/q/1",
                "Set a timeout on every requests call, otherwise it can hang.",
            ),
            r(
                "Python packaging guide",
                "https://packaging.python.org/en/latest/",
                "A guide to packaging Python projects.",
            ),
        ]
    }

    #[test]
    fn empty_batch_reports_error_object() {
        let v = ResultAnalyzer::default().analyze(&[], AnalysisKind::Summary);
        assert_eq!(v["error"], "No search results provided for analysis");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            "sentiment".parse::<AnalysisKind>(),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!("Keywords".parse::<AnalysisKind>().unwrap(), AnalysisKind::Keywords);
    }

    #[test]
    fn summary_metrics_and_themes() {
        let v = ResultAnalyzer::default().analyze(&batch(), AnalysisKind::Summary);
        assert_eq!(v["analysis_type"], "summary");
        assert_eq!(v["metrics"]["total_results"], 3);
        assert_eq!(v["metrics"]["unique_domains"], 3);
        let themes: Vec<&str> = v["themes"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t.as_str())
            .collect();
        assert!(themes.contains(&"python"));
        // "python" and "requests" tie at four; first seen wins.
        assert_eq!(v["top_keywords"][0]["keyword"], "python");
        assert_eq!(v["top_keywords"][0]["frequency"], 4);
        let insights = v["insights"].as_array().unwrap();
        assert!(insights
            .iter()
            .any(|i| i.as_str().unwrap_or("").starts_with("Limited number")));
    }

    #[test]
    fn sources_credibility_table() {
        let v = ResultAnalyzer::default().analyze(&batch(), AnalysisKind::Sources);
        assert_eq!(v["credibility_scores"]["github.com"], 0.9);
        assert_eq!(v["credibility_scores"]["stackoverflow.com"], 0.9);
        assert_eq!(v["credibility_scores"]["packaging.python.org"], 0.8);
        let div = v["diversity_metrics"]["diversity_score"].as_f64().unwrap();
        assert!((div - (1.0 - 3.0 * (1.0f64 / 3.0).powi(2))).abs() < 1e-9);
        assert_eq!(v["domain_distribution"]["total_domains"], 3);
    }

    #[test]
    fn keywords_respect_min_frequency_and_cluster() {
        let v = ResultAnalyzer::default().analyze(&batch(), AnalysisKind::Keywords);
        let freq = v["keyword_frequency"].as_object().unwrap();
        assert!(freq.contains_key("requests"));
        assert!(freq.contains_key("python"));
        assert!(!freq.contains_key("install"));
        assert!(freq.values().all(|n| n.as_u64().unwrap() >= 2));
        assert!(v["keyword_clusters"]
            .as_object()
            .unwrap()
            .values()
            .all(|m| m.as_array().unwrap().len() > 1));
        // 0.7 * 4/4 + 0.3 * 4/3
        let top = v["importance_scores"]["requests"].as_f64().unwrap();
        assert!((top - 1.1).abs() < 1e-9);
    }

    #[test]
    fn relevance_distribution_sums_to_batch() {
        let v = ResultAnalyzer::default().analyze(&batch(), AnalysisKind::Relevance);
        let d = &v["relevance_distribution"];
        let total = d["high_relevance"].as_u64().unwrap()
            + d["medium_relevance"].as_u64().unwrap()
            + d["low_relevance"].as_u64().unwrap();
        assert_eq!(total, 3);
        assert_eq!(v["relevance_scores"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn trends_and_max_results_cap() {
        let mut many = batch();
        many.extend(batch());
        let v = ResultAnalyzer::new(2, 2).analyze(&many, AnalysisKind::Trends);
        assert_eq!(v["analysis_type"], "trends");
        // Only the first two results are considered; the first says "latest".
        assert_eq!(v["freshness_indicators"]["fresh_content"], 1);
        assert_eq!(v["freshness_indicators"]["evergreen_content"], 1);
    }
}
