//! Turn a raw error message into [`ErrorSignals`].
//!
//! Parsing never fails: a message with no recognizable error kind yields
//! [`UNKNOWN_ERROR_KIND`], and key terms fall back to raw tokens (then to the
//! trimmed message itself) so non-blank input always carries something to search for.

use crate::tables::CompiledTables;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub const UNKNOWN_ERROR_KIND: &str = "unknown";

/// Tokens shorter than this are noise (`a`, `py`, line numbers like `12`).
const MIN_TERM_CHARS: usize = 3;
/// Cap for the whole-message fallback term.
const FALLBACK_TERM_CHARS: usize = 100;

/// Immutable signals extracted from one error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignals {
    error_kind: String,
    key_terms: Vec<String>,
    tech_stack: Option<String>,
}

impl ErrorSignals {
    pub fn new(
        error_kind: impl Into<String>,
        key_terms: Vec<String>,
        tech_stack: Option<String>,
    ) -> Self {
        let error_kind = error_kind.into();
        Self {
            error_kind: if error_kind.trim().is_empty() {
                UNKNOWN_ERROR_KIND.to_string()
            } else {
                error_kind
            },
            key_terms,
            tech_stack: normalize_tech_stack(tech_stack.as_deref()),
        }
    }

    pub fn error_kind(&self) -> &str {
        &self.error_kind
    }

    /// The error kind, unless it is the `unknown` sentinel.
    pub fn known_kind(&self) -> Option<&str> {
        (self.error_kind != UNKNOWN_ERROR_KIND).then_some(self.error_kind.as_str())
    }

    pub fn key_terms(&self) -> &[String] {
        &self.key_terms
    }

    pub fn tech_stack(&self) -> Option<&str> {
        self.tech_stack.as_deref()
    }

    /// Distinct lower-cased terms used for relevance matching: known kind first, then key terms.
    pub fn match_terms(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.known_kind()
            .into_iter()
            .chain(self.key_terms.iter().map(String::as_str))
            .map(str::to_lowercase)
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect()
    }
}

fn normalize_tech_stack(hint: Option<&str>) -> Option<String> {
    hint.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

/// `_` counts as a separator so `snake_case_name` yields its parts.
pub(crate) fn tokenize(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty())
}

/// `java.lang.NullPointerException` -> `NullPointerException`.
fn strip_qualifiers(kind: &str) -> &str {
    kind.rsplit('.').next().unwrap_or(kind)
}

#[derive(Debug, Clone)]
pub struct ErrorParser {
    tables: Arc<CompiledTables>,
    max_key_terms: usize,
}

impl ErrorParser {
    pub fn new(tables: Arc<CompiledTables>, max_key_terms: usize) -> Self {
        Self {
            tables,
            max_key_terms: max_key_terms.max(1),
        }
    }

    pub fn parse(&self, message: &str) -> ErrorSignals {
        self.parse_with_hint(message, None)
    }

    /// The hint is stored trimmed and lower-cased; no stack is inferred when it is absent.
    pub fn parse_with_hint(&self, message: &str, tech_stack: Option<&str>) -> ErrorSignals {
        if message.trim().is_empty() {
            return ErrorSignals::new(UNKNOWN_ERROR_KIND, Vec::new(), tech_stack.map(str::to_string));
        }
        let kind = self
            .error_kind(message)
            .unwrap_or_else(|| UNKNOWN_ERROR_KIND.to_string());
        let terms = self.key_terms(message);
        ErrorSignals::new(kind, terms, tech_stack.map(str::to_string))
    }

    fn error_kind(&self, message: &str) -> Option<String> {
        for rule in self.tables.error_kind_rules() {
            let Some(caps) = rule.regex.captures(message) else {
                continue;
            };
            let kind = match &rule.kind {
                Some(fixed) => fixed.clone(),
                None => match caps.get(1) {
                    Some(m) => strip_qualifiers(m.as_str()).to_string(),
                    None => continue,
                },
            };
            if !kind.is_empty() {
                tracing::trace!(rule = %rule.name, kind = %kind, "error kind matched");
                return Some(kind);
            }
        }
        None
    }

    fn key_terms(&self, message: &str) -> Vec<String> {
        let filtered = self.collect_terms(message, true);
        if !filtered.is_empty() {
            return filtered;
        }
        let raw = self.collect_terms(message, false);
        if !raw.is_empty() {
            return raw;
        }
        vec![message.trim().chars().take(FALLBACK_TERM_CHARS).collect()]
    }

    /// Case-insensitive dedup; the first casing seen is kept.
    fn collect_terms(&self, message: &str, filter: bool) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for tok in tokenize(message) {
            let lower = tok.to_lowercase();
            if filter
                && (tok.chars().count() < MIN_TERM_CHARS || self.tables.is_stopword(&lower))
            {
                continue;
            }
            if seen.insert(lower) {
                out.push(tok.to_string());
                if out.len() >= self.max_key_terms {
                    break;
                }
            }
        }
        out
    }
}
