//! Per-result scoring: source classification, relevance, quality and a short summary.

use crate::config::FinderConfig;
use crate::signals::{tokenize, ErrorSignals};
use crate::tables::CompiledTables;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use websolve_core::{url_domain, Error, Result, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    StackOverflow,
    GitHub,
    Documentation,
    Other,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StackOverflow => "stackoverflow",
            Self::GitHub => "github",
            Self::Documentation => "documentation",
            Self::Other => "other",
        }
    }
}

/// A ranked candidate. Both scores are always in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSolution {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub source: SourceKind,
    pub relevance_score: f64,
    pub quality_score: f64,
}

/// Fetched text with this share (or more) of U+FFFD is treated as undecodable.
const MAX_REPLACEMENT_RATIO: f64 = 0.1;
const ELLIPSIS: char = '…';

#[derive(Debug, Clone)]
pub struct ContentProcessor {
    tables: Arc<CompiledTables>,
    trust_weight: f64,
    length_weight: f64,
    length_saturation_chars: usize,
    max_summary_chars: usize,
}

impl ContentProcessor {
    pub fn new(tables: Arc<CompiledTables>, config: &FinderConfig) -> Self {
        Self {
            tables,
            trust_weight: config.trust_weight,
            length_weight: config.length_weight,
            length_saturation_chars: config.length_saturation_chars.max(1),
            max_summary_chars: config.max_summary_chars.max(16),
        }
    }

    pub fn classify(&self, url: &str) -> SourceKind {
        url_domain(url)
            .map(|host| self.tables.classify_host(&host))
            .unwrap_or(SourceKind::Other)
    }

    /// Score one search hit. `fetched` is the page text when it was fetched; text that
    /// turns out unusable is dropped and the hit is scored from title and snippet alone.
    pub fn score(
        &self,
        result: &SearchResult,
        signals: &ErrorSignals,
        fetched: Option<&str>,
    ) -> ScoredSolution {
        let title = result
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(result.url.as_str())
            .to_string();
        let snippet = result
            .snippet
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let body = match fetched.map(usable_text) {
            Some(Ok(text)) => Some(text),
            Some(Err(e)) => {
                tracing::debug!(url = %result.url, error = %e, "falling back to snippet");
                None
            }
            None => None,
        };

        let text = match body {
            Some(b) => b.to_string(),
            None => match snippet {
                Some(s) => format!("{title}\n{s}"),
                None => title.clone(),
            },
        };
        let lowered = lower_chars(&text);
        let terms = signals.match_terms();

        let source = self.classify(&result.url);
        let relevance = relevance(&lowered, &terms);
        let quality = self.quality(source, text.chars().count());

        let summary = body
            .and_then(|b| self.window_summary(b, &lower_chars(b), &terms))
            .or_else(|| snippet.map(|s| self.clip(s)))
            .unwrap_or_else(|| self.clip(&title));

        ScoredSolution {
            url: result.url.clone(),
            title,
            summary,
            source,
            relevance_score: relevance,
            quality_score: quality,
        }
    }

    /// Source trust blended with a saturating length factor.
    pub fn quality(&self, source: SourceKind, content_chars: usize) -> f64 {
        let total = self.trust_weight + self.length_weight;
        if total <= 0.0 {
            return 0.0;
        }
        let length_factor =
            (content_chars as f64 / self.length_saturation_chars as f64).min(1.0).sqrt();
        let trust = self.tables.trust_weight(source);
        ((self.trust_weight * trust + self.length_weight * length_factor) / total).clamp(0.0, 1.0)
    }

    /// A window of at most `max_summary_chars` around the first hit of the strongest term
    /// (terms are ordered strongest first).
    fn window_summary(&self, text: &str, lowered: &str, terms: &[String]) -> Option<String> {
        let spans = token_spans(lowered);
        let tokens: HashSet<&str> = spans.iter().map(|&(_, t)| t).collect();
        let first = terms
            .iter()
            .find(|t| term_matches(t, &tokens))
            .and_then(|t| tokenize(t).next())?;
        let byte_pos = spans.iter().find(|&&(_, t)| t == first).map(|&(pos, _)| pos)?;
        let chars: Vec<char> = text.chars().collect();
        let anchor = lowered[..byte_pos].chars().count();
        let max = self.max_summary_chars;

        let mut start = anchor.saturating_sub(max / 3);
        if start > 0 {
            // Snap forward to a word boundary, but never past the anchor.
            if let Some(off) = chars[start..anchor].iter().position(|c| c.is_whitespace()) {
                start += off + 1;
            }
        }
        let end = (start + max).min(chars.len());
        let body = collapse_ws(&chars[start..end].iter().collect::<String>());
        if body.is_empty() {
            return None;
        }
        let mut out = String::new();
        if start > 0 {
            out.push(ELLIPSIS);
        }
        out.push_str(&body);
        if end < chars.len() {
            out.push(ELLIPSIS);
        }
        Some(out)
    }

    fn clip(&self, s: &str) -> String {
        let s = collapse_ws(s);
        if s.chars().count() <= self.max_summary_chars {
            return s;
        }
        let mut out: String = s.chars().take(self.max_summary_chars).collect();
        out.push(ELLIPSIS);
        out
    }
}

/// Fraction of distinct terms present as whole tokens in `lowered`.
fn relevance(lowered: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let tokens: HashSet<&str> = tokenize(lowered).collect();
    let hits = terms.iter().filter(|t| term_matches(t, &tokens)).count();
    (hits as f64 / terms.len() as f64).clamp(0.0, 1.0)
}

/// Every token of `term` must appear as a token of the text; `map` does not match `bitmap`.
fn term_matches(term: &str, tokens: &HashSet<&str>) -> bool {
    let mut parts = tokenize(term).peekable();
    parts.peek().is_some() && parts.all(|p| tokens.contains(p))
}

/// Alphanumeric runs of `s` with their byte offsets.
fn token_spans(s: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(st)) => {
                spans.push((st, &s[st..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(st) = start {
        spans.push((st, &s[st..]));
    }
    spans
}

/// Lower-case char by char so char offsets line up with the original text.
fn lower_chars(s: &str) -> String {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reject fetched text that cannot be scored: blank, binary, or mostly undecodable.
pub fn usable_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedContent("empty body".to_string()));
    }
    if trimmed.contains('\0') {
        return Err(Error::MalformedContent("binary body".to_string()));
    }
    let total = trimmed.chars().count();
    let bad = trimmed.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    if bad as f64 / total as f64 >= MAX_REPLACEMENT_RATIO {
        return Err(Error::MalformedContent(format!(
            "{bad} of {total} chars undecodable"
        )));
    }
    Ok(trimmed)
}
