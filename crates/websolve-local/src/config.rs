use std::time::Duration;
use websolve_core::{Error, Result};

pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_CONTENT_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings shared by the local search and fetch collaborators.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub searxng_endpoints: Vec<String>,
    pub auth: Option<BasicAuth>,
    /// One proxy for every scheme. reqwest's system-proxy support still applies when unset.
    pub proxy: Option<String>,
    pub search_timeout: Duration,
    pub max_content_size: u64,
    /// Skip the private-address guard on fetched URLs (fixtures, intranets).
    pub allow_private_urls: bool,
    /// Forward `Authorization`/`Cookie`/`Proxy-Authorization` request headers.
    pub allow_unsafe_headers: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            searxng_endpoints: Vec::new(),
            auth: None,
            proxy: None,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            allow_private_urls: false,
            allow_unsafe_headers: false,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn env_truthy(key: &str) -> bool {
    matches!(
        std::env::var(key)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `SEARXNG_URL` first, then any extra endpoints from `WEBSOLVE_SEARXNG_ENDPOINTS`
/// (comma/whitespace separated). Order is kept; duplicates are dropped.
pub fn searxng_endpoints_from_env() -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        let s = s.trim().trim_end_matches('/');
        if !s.is_empty() && !out.iter().any(|e| e == s) {
            out.push(s.to_string());
        }
    };
    if let Some(v) = env_nonempty("SEARXNG_URL") {
        push(&v);
    }
    if let Ok(v) = std::env::var("WEBSOLVE_SEARXNG_ENDPOINTS") {
        for raw in v.split(|c: char| c == ',' || c.is_whitespace()) {
            push(raw);
        }
    }
    out
}

impl LocalConfig {
    pub fn from_env() -> Result<Self> {
        let searxng_endpoints = searxng_endpoints_from_env();
        for ep in &searxng_endpoints {
            if !(ep.starts_with("http://") || ep.starts_with("https://")) {
                return Err(Error::InvalidUrl(format!(
                    "SearXNG endpoint must start with http:// or https:// (got {ep:?})"
                )));
            }
        }

        let auth = match (env_nonempty("AUTH_USERNAME"), env_nonempty("AUTH_PASSWORD")) {
            (Some(username), Some(password)) => Some(BasicAuth { username, password }),
            (None, None) => None,
            _ => {
                tracing::warn!("AUTH_USERNAME and AUTH_PASSWORD must both be set; ignoring basic auth");
                None
            }
        };

        let search_timeout = match env_nonempty("SEARXNG_TIMEOUT") {
            Some(raw) => match raw.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid SEARXNG_TIMEOUT");
                    DEFAULT_SEARCH_TIMEOUT
                }
            },
            None => DEFAULT_SEARCH_TIMEOUT,
        };

        let max_content_size = match env_nonempty("SEARXNG_MAX_CONTENT_SIZE") {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "ignoring invalid SEARXNG_MAX_CONTENT_SIZE");
                DEFAULT_MAX_CONTENT_SIZE
            }),
            None => DEFAULT_MAX_CONTENT_SIZE,
        };

        Ok(Self {
            searxng_endpoints,
            auth,
            proxy: env_nonempty("HTTPS_PROXY").or_else(|| env_nonempty("HTTP_PROXY")),
            search_timeout,
            max_content_size,
            allow_private_urls: env_truthy("WEBSOLVE_ALLOW_PRIVATE_URLS"),
            allow_unsafe_headers: env_truthy("WEBSOLVE_ALLOW_UNSAFE_HEADERS"),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_env::{EnvGuard, ENV_LOCK};
    use super::*;

    #[test]
    fn endpoints_merge_and_dedup() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _g1 = EnvGuard::set("SEARXNG_URL", "http://b/");
        let _g2 = EnvGuard::set("WEBSOLVE_SEARXNG_ENDPOINTS", "http://a, http://b http://a");
        assert_eq!(
            searxng_endpoints_from_env(),
            vec!["http://b".to_string(), "http://a".to_string()]
        );
    }

    #[test]
    fn from_env_reads_limits_and_auth() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _g1 = EnvGuard::set("SEARXNG_URL", "https://searx.example.org");
        let _g2 = EnvGuard::unset("WEBSOLVE_SEARXNG_ENDPOINTS");
        let _g3 = EnvGuard::set("SEARXNG_TIMEOUT", "2.5");
        let _g4 = EnvGuard::set("SEARXNG_MAX_CONTENT_SIZE", "1024");
        let _g5 = EnvGuard::set("AUTH_USERNAME", "u");
        let _g6 = EnvGuard::set("AUTH_PASSWORD", "p");
        let c = LocalConfig::from_env().unwrap();
        assert_eq!(c.searxng_endpoints, vec!["https://searx.example.org".to_string()]);
        assert_eq!(c.search_timeout, Duration::from_millis(2_500));
        assert_eq!(c.max_content_size, 1024);
        assert_eq!(c.auth.as_ref().map(|a| a.username.as_str()), Some("u"));
        let dbg = format!("{:?}", c.auth);
        assert!(dbg.contains("<redacted>") && !dbg.contains("\"p\""));
    }

    #[test]
    fn half_configured_auth_is_ignored_and_bad_scheme_rejected() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _g1 = EnvGuard::set("SEARXNG_URL", "searx.example.org");
        let _g2 = EnvGuard::unset("WEBSOLVE_SEARXNG_ENDPOINTS");
        assert!(matches!(LocalConfig::from_env(), Err(Error::InvalidUrl(_))));

        let _g3 = EnvGuard::set("SEARXNG_URL", "http://ok");
        let _g4 = EnvGuard::set("AUTH_USERNAME", "u");
        let _g5 = EnvGuard::unset("AUTH_PASSWORD");
        let _g6 = EnvGuard::set("SEARXNG_TIMEOUT", "nope");
        let c = LocalConfig::from_env().unwrap();
        assert!(c.auth.is_none());
        assert_eq!(c.search_timeout, DEFAULT_SEARCH_TIMEOUT);
    }
}
