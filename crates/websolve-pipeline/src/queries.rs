use crate::signals::ErrorSignals;
use crate::tables::CompiledTables;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a query is aimed. Declaration order is emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    General,
    QaSite,
    CodeHost,
    Docs,
}

impl SearchTarget {
    pub const ALL: [SearchTarget; 4] = [
        SearchTarget::General,
        SearchTarget::QaSite,
        SearchTarget::CodeHost,
        SearchTarget::Docs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::QaSite => "qa_site",
            Self::CodeHost => "code_host",
            Self::Docs => "docs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedQuery {
    pub text: String,
    pub target: SearchTarget,
}

/// Deterministic: the same signals and tables always give the same queries in the same order.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    tables: Arc<CompiledTables>,
    query_terms: usize,
}

impl QueryBuilder {
    pub fn new(tables: Arc<CompiledTables>, query_terms: usize) -> Self {
        Self {
            tables,
            query_terms: query_terms.max(1),
        }
    }

    pub fn build(&self, signals: &ErrorSignals) -> Vec<TargetedQuery> {
        if signals.key_terms().is_empty() {
            // Nothing specific to search for; a bare stack name is still worth one general query.
            return signals
                .tech_stack()
                .map(|stack| {
                    vec![TargetedQuery {
                        text: stack.to_string(),
                        target: SearchTarget::General,
                    }]
                })
                .unwrap_or_default();
        }

        let base = self.base_text(signals);
        SearchTarget::ALL
            .iter()
            .map(|&target| {
                let suffix = self.tables.query_suffix(target).trim();
                let text = if suffix.is_empty() {
                    base.clone()
                } else {
                    format!("{base} {suffix}")
                };
                TargetedQuery { text, target }
            })
            .collect()
    }

    /// Known kind, then the leading key terms, then the stack hint. Case-insensitive dedup.
    fn base_text(&self, signals: &ErrorSignals) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(kind) = signals.known_kind() {
            push_distinct(&mut parts, kind);
        }
        let mut taken = 0;
        for term in signals.key_terms() {
            if taken >= self.query_terms {
                break;
            }
            if push_distinct(&mut parts, term) {
                taken += 1;
            }
        }
        if let Some(stack) = signals.tech_stack() {
            push_distinct(&mut parts, stack);
        }
        parts.join(" ")
    }
}

fn push_distinct<'a>(parts: &mut Vec<&'a str>, s: &'a str) -> bool {
    if parts.iter().any(|p| p.eq_ignore_ascii_case(s)) {
        return false;
    }
    parts.push(s);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(CompiledTables::builtin(), 5)
    }

    fn terms(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_query_per_target_in_order() {
        let s = ErrorSignals::new(
            "ModuleNotFoundError",
            terms(&["ModuleNotFoundError", "module", "named", "requests"]),
            Some("python".into()),
        );
        let qs = builder().build(&s);
        let targets: Vec<_> = qs.iter().map(|q| q.target).collect();
        assert_eq!(targets, SearchTarget::ALL.to_vec());
        assert_eq!(qs[0].text, "ModuleNotFoundError module named requests python");
        assert_eq!(
            qs[1].text,
            "ModuleNotFoundError module named requests python site:stackoverflow.com"
        );
        assert!(qs[2].text.ends_with("site:github.com"));
    }

    #[test]
    fn build_is_deterministic() {
        let s = ErrorSignals::new("E0382", terms(&["borrow", "moved", "value"]), None);
        assert_eq!(builder().build(&s), builder().build(&s));
    }

    #[test]
    fn unknown_kind_is_left_out() {
        let s = ErrorSignals::new("unknown", terms(&["broken", "arm64"]), None);
        let qs = builder().build(&s);
        assert_eq!(qs[0].text, "broken arm64");
        assert!(qs.iter().all(|q| !q.text.contains("unknown")));
    }

    #[test]
    fn query_terms_are_capped() {
        let b = QueryBuilder::new(CompiledTables::builtin(), 2);
        let s = ErrorSignals::new("KeyError", terms(&["KeyError", "alpha", "beta", "gamma"]), None);
        assert_eq!(b.build(&s)[0].text, "KeyError alpha beta");
    }

    #[test]
    fn empty_terms_fall_back_to_stack_or_nothing() {
        let s = ErrorSignals::new("unknown", Vec::new(), Some("Rust".into()));
        let qs = builder().build(&s);
        assert_eq!(
            qs,
            vec![TargetedQuery {
                text: "rust".into(),
                target: SearchTarget::General
            }]
        );

        let s = ErrorSignals::new("unknown", Vec::new(), None);
        assert!(builder().build(&s).is_empty());
    }
}
