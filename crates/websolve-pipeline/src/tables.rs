//! Heuristic lookup tables: stopwords, error-kind patterns, source-host patterns,
//! per-target query suffixes and per-source trust weights.
//!
//! The tables are plain data. Built-in defaults cover the common cases; a JSON file can
//! replace any subset of them at startup (`WEBSOLVE_PATTERNS_FILE`). Once compiled, a
//! [`CompiledTables`] is shared immutably behind an `Arc`.

use crate::content::SourceKind;
use crate::queries::SearchTarget;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use websolve_core::{Error, Result};

/// One row of the error-kind table. Rows are evaluated in order; the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorKindRule {
    pub name: String,
    pub pattern: String,
    /// Fixed label. When unset, capture group 1 of `pattern` is the error kind.
    #[serde(default)]
    pub kind: Option<String>,
}

/// One row of the source table, matched against the lower-cased URL host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceHostRule {
    pub pattern: String,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySuffixes {
    pub general: String,
    pub qa_site: String,
    pub code_host: String,
    pub docs: String,
}

impl Default for QuerySuffixes {
    fn default() -> Self {
        Self {
            general: String::new(),
            qa_site: "site:stackoverflow.com".to_string(),
            code_host: "site:github.com".to_string(),
            docs: "official documentation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustWeights {
    pub stackoverflow: f64,
    pub github: f64,
    pub documentation: f64,
    pub other: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            stackoverflow: 0.9,
            github: 0.75,
            documentation: 0.85,
            other: 0.5,
        }
    }
}

/// Serializable form of the tables. Missing fields in a loaded file keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatternTables {
    pub stopwords: Vec<String>,
    pub error_kinds: Vec<ErrorKindRule>,
    pub source_hosts: Vec<SourceHostRule>,
    pub query_suffixes: QuerySuffixes,
    pub trust_weights: TrustWeights,
}

const DEFAULT_STOPWORDS: &[&str] = &[
    // articles, conjunctions, pronouns
    "the", "and", "but", "nor", "this", "that", "these", "those", "you", "she", "they", "them",
    "their", "there", "its", "our", "your", "what", "which", "who", "whom", "when", "where",
    "why", "how", "all", "each", "every", "some", "any", "few", "more", "most", "other", "such",
    "not", "only", "own", "same", "than", "too", "very", "just", "now", "also", "then",
    // prepositions
    "for", "with", "from", "about", "into", "through", "during", "before", "after", "above",
    "below", "between", "among", "over", "under", "via", "per", "onto", "upon", "within",
    "without",
    // auxiliaries and generic verbs
    "are", "was", "were", "been", "being", "have", "has", "had", "does", "did", "doing", "will",
    "would", "could", "should", "may", "might", "must", "can", "cannot", "get", "got", "use",
    "used", "using", "make", "made", "try", "tried", "trying", "see", "run", "ran", "running",
    "occurred", "occur", "happened", "please", "while", "unable",
    // generic diagnostics noise
    "error", "errors", "exception", "traceback", "recent", "last", "line",
];

fn rule(name: &str, pattern: &str, kind: Option<&str>) -> ErrorKindRule {
    ErrorKindRule {
        name: name.to_string(),
        pattern: pattern.to_string(),
        kind: kind.map(str::to_string),
    }
}

fn host(pattern: &str, source: SourceKind) -> SourceHostRule {
    SourceHostRule {
        pattern: pattern.to_string(),
        source,
    }
}

impl Default for PatternTables {
    fn default() -> Self {
        Self {
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            error_kinds: vec![
                rule("rust_error_code", r"\berror\[(E\d{4})\]", None),
                rule(
                    "java_uncaught",
                    r#"Exception in thread "[^"]*" ((?:[A-Za-z_$][\w$]*\.)*[A-Za-z_$][\w$]*)"#,
                    None,
                ),
                rule(
                    "class_with_colon",
                    r"\b((?:[A-Za-z_][A-Za-z0-9_]*\.)*[A-Za-z_][A-Za-z0-9_]*(?:Error|Exception|Warning|Fault))\s*:",
                    None,
                ),
                rule(
                    "errno",
                    r"\b(E(?:NOENT|ACCES|PERM|EXIST|ADDRINUSE|ADDRNOTAVAIL|CONNREFUSED|CONNRESET|CONNABORTED|TIMEDOUT|NOTFOUND|PIPE|MFILE|ISDIR|NOTDIR|NOTEMPTY|AGAIN|HOSTUNREACH|NETUNREACH))\b",
                    None,
                ),
                rule("rust_panic", r"thread '[^']*' panicked", Some("panic")),
                rule("go_panic", r"(?m)^\s*panic: ", Some("panic")),
                rule(
                    "segfault",
                    r"(?i)\bsegmentation fault\b",
                    Some("SegmentationFault"),
                ),
                rule(
                    "bare_class",
                    r"\b([A-Z][A-Za-z0-9_]*(?:Error|Exception))\b",
                    None,
                ),
            ],
            source_hosts: vec![
                host(r"(^|\.)stackoverflow\.com$", SourceKind::StackOverflow),
                host(r"(^|\.)stackexchange\.com$", SourceKind::StackOverflow),
                host(r"(^|\.)(superuser|serverfault|askubuntu)\.com$", SourceKind::StackOverflow),
                host(r"(^|\.)github\.com$", SourceKind::GitHub),
                host(r"(^|\.)githubusercontent\.com$", SourceKind::GitHub),
                host(r"(^|\.)gitlab\.com$", SourceKind::GitHub),
                host(r"(^|\.)bitbucket\.org$", SourceKind::GitHub),
                host(r"^(docs|doc|developer|developers|learn)\.", SourceKind::Documentation),
                host(r"(^|\.)readthedocs\.(io|org)$", SourceKind::Documentation),
                host(r"(^|\.)docs\.rs$", SourceKind::Documentation),
                host(r"(^|\.)pkg\.go\.dev$", SourceKind::Documentation),
                host(r"(^|\.)nodejs\.org$", SourceKind::Documentation),
                host(r"(^|\.)cppreference\.com$", SourceKind::Documentation),
            ],
            query_suffixes: QuerySuffixes::default(),
            trust_weights: TrustWeights::default(),
        }
    }
}

impl PatternTables {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| Error::InvalidArgument(format!("pattern tables: {e}")))
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidArgument(format!("pattern tables {}: {e}", path.display()))
        })?;
        Self::from_json_str(&s)
    }

    /// Validate and compile. Bad regexes and out-of-range weights are rejected here,
    /// never at match time.
    pub fn compile(self) -> Result<CompiledTables> {
        let mut error_kinds = Vec::with_capacity(self.error_kinds.len());
        for r in self.error_kinds {
            let re = Regex::new(&r.pattern).map_err(|e| {
                Error::InvalidArgument(format!("error_kinds[{}]: {e}", r.name))
            })?;
            if r.kind.is_none() && re.captures_len() < 2 {
                return Err(Error::InvalidArgument(format!(
                    "error_kinds[{}]: needs a capture group or a fixed kind",
                    r.name
                )));
            }
            error_kinds.push(CompiledKindRule {
                name: r.name,
                regex: re,
                kind: r.kind,
            });
        }

        let mut source_hosts = Vec::with_capacity(self.source_hosts.len());
        for h in self.source_hosts {
            let re = Regex::new(&h.pattern)
                .map_err(|e| Error::InvalidArgument(format!("source_hosts {:?}: {e}", h.pattern)))?;
            source_hosts.push((re, h.source));
        }

        let w = &self.trust_weights;
        for (name, v) in [
            ("stackoverflow", w.stackoverflow),
            ("github", w.github),
            ("documentation", w.documentation),
            ("other", w.other),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidArgument(format!(
                    "trust_weights.{name} must be in [0,1] (got {v})"
                )));
            }
        }

        Ok(CompiledTables {
            stopwords: self
                .stopwords
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            error_kinds,
            source_hosts,
            query_suffixes: self.query_suffixes,
            trust_weights: self.trust_weights,
        })
    }
}

#[derive(Debug)]
pub struct CompiledKindRule {
    pub name: String,
    pub regex: Regex,
    pub kind: Option<String>,
}

#[derive(Debug)]
pub struct CompiledTables {
    stopwords: HashSet<String>,
    error_kinds: Vec<CompiledKindRule>,
    source_hosts: Vec<(Regex, SourceKind)>,
    query_suffixes: QuerySuffixes,
    trust_weights: TrustWeights,
}

impl CompiledTables {
    /// The built-in tables, compiled once per process.
    pub fn builtin() -> Arc<CompiledTables> {
        static BUILTIN: OnceLock<Arc<CompiledTables>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                Arc::new(
                    PatternTables::default()
                        .compile()
                        .expect("built-in pattern tables must compile"),
                )
            })
            .clone()
    }

    /// Built-in tables unless `WEBSOLVE_PATTERNS_FILE` names a JSON replacement.
    pub fn from_env() -> Result<Arc<CompiledTables>> {
        match std::env::var("WEBSOLVE_PATTERNS_FILE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            Some(p) => {
                tracing::debug!(path = %p, "loading pattern tables");
                Ok(Arc::new(PatternTables::load_json(Path::new(&p))?.compile()?))
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn is_stopword(&self, lower: &str) -> bool {
        self.stopwords.contains(lower)
    }

    pub fn error_kind_rules(&self) -> &[CompiledKindRule] {
        &self.error_kinds
    }

    /// First host rule that matches wins; unmatched hosts are `Other`.
    pub fn classify_host(&self, host: &str) -> SourceKind {
        let host = host.trim().to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.source_hosts
            .iter()
            .find(|(re, _)| re.is_match(host))
            .map(|(_, kind)| *kind)
            .unwrap_or(SourceKind::Other)
    }

    pub fn query_suffix(&self, target: SearchTarget) -> &str {
        let s = &self.query_suffixes;
        match target {
            SearchTarget::General => &s.general,
            SearchTarget::QaSite => &s.qa_site,
            SearchTarget::CodeHost => &s.code_host,
            SearchTarget::Docs => &s.docs,
        }
    }

    pub fn trust_weight(&self, source: SourceKind) -> f64 {
        let w = &self.trust_weights;
        match source {
            SourceKind::StackOverflow => w.stackoverflow,
            SourceKind::GitHub => w.github,
            SourceKind::Documentation => w.documentation,
            SourceKind::Other => w.other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_compile_and_are_shared() {
        let a = CompiledTables::builtin();
        let b = CompiledTables::builtin();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_stopword("the"));
        assert!(!a.is_stopword("named"));
        assert!(!a.is_stopword("module"));
    }

    #[test]
    fn classify_host_first_match_wins() {
        let t = CompiledTables::builtin();
        assert_eq!(t.classify_host("stackoverflow.com"), SourceKind::StackOverflow);
        assert_eq!(t.classify_host("www.stackoverflow.com"), SourceKind::StackOverflow);
        assert_eq!(t.classify_host("unix.stackexchange.com"), SourceKind::StackOverflow);
        assert_eq!(t.classify_host("github.com"), SourceKind::GitHub);
        assert_eq!(t.classify_host("docs.python.org"), SourceKind::Documentation);
        assert_eq!(t.classify_host("developer.mozilla.org"), SourceKind::Documentation);
        assert_eq!(t.classify_host("requests.readthedocs.io"), SourceKind::Documentation);
        assert_eq!(t.classify_host("example.com"), SourceKind::Other);
        // Suffix match must be anchored on a label boundary.
        assert_eq!(t.classify_host("notgithub.com"), SourceKind::Other);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_tables() {
        let t = PatternTables::from_json_str(r#"{"stopwords": ["foo"]}"#).unwrap();
        assert_eq!(t.stopwords, vec!["foo".to_string()]);
        assert_eq!(t.error_kinds, PatternTables::default().error_kinds);
        let c = t.compile().unwrap();
        assert!(c.is_stopword("foo"));
        assert!(!c.is_stopword("the"));
    }

    #[test]
    fn loaded_tables_can_add_sources_without_code_changes() {
        let json = r#"{
            "source_hosts": [
                {"pattern": "(^|\\.)discuss\\.example\\.org$", "source": "stackoverflow"}
            ],
            "query_suffixes": {"general": "", "qa_site": "site:discuss.example.org",
                               "code_host": "site:git.example.org", "docs": "manual"}
        }"#;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), json).unwrap();
        let c = PatternTables::load_json(tmp.path()).unwrap().compile().unwrap();
        assert_eq!(c.classify_host("discuss.example.org"), SourceKind::StackOverflow);
        assert_eq!(c.classify_host("stackoverflow.com"), SourceKind::Other);
        assert_eq!(c.query_suffix(SearchTarget::Docs), "manual");
    }

    #[test]
    fn compile_rejects_bad_rows() {
        let mut t = PatternTables::default();
        t.error_kinds = vec![rule("broken", r"(unclosed", None)];
        assert!(matches!(t.compile(), Err(Error::InvalidArgument(_))));

        let mut t = PatternTables::default();
        t.error_kinds = vec![rule("no_capture", r"Error:", None)];
        assert!(t.compile().is_err());

        let mut t = PatternTables::default();
        t.trust_weights.other = 1.5;
        assert!(t.compile().is_err());
    }
}
