use serde::Serialize;
use websolve_core::Error;

pub(crate) const SCHEMA_VERSION: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    InvalidUrl,
    NotConfigured,
    NotSupported,
    SearchFailed,
    FetchFailed,
    Timeout,
    UnexpectedError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::InvalidUrl => "invalid_url",
            Self::NotConfigured => "not_configured",
            Self::NotSupported => "not_supported",
            Self::SearchFailed => "search_failed",
            Self::FetchFailed => "fetch_failed",
            Self::Timeout => "timeout",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::SearchFailed | Self::FetchFailed | Self::Timeout => true,
            // Configuration and invalid input need a change before a retry can help.
            Self::InvalidParams
            | Self::InvalidUrl
            | Self::NotConfigured
            | Self::NotSupported
            | Self::UnexpectedError => false,
        }
    }

    /// Map a collaborator error; `failure` is the code for a plain search/fetch failure.
    pub(crate) fn for_error(e: &Error, failure: ErrorCode) -> Self {
        match e {
            Error::InvalidArgument(_) => Self::InvalidParams,
            Error::InvalidUrl(_) => Self::InvalidUrl,
            Error::NotConfigured(_) => Self::NotConfigured,
            Error::NotSupported(_) => Self::NotSupported,
            Error::Timeout(_) => Self::Timeout,
            Error::Search(_) => Self::SearchFailed,
            Error::Fetch(_) | Error::MalformedContent(_) => failure,
        }
    }

    pub(crate) fn default_hint(self) -> &'static str {
        match self {
            Self::InvalidParams => "Check the tool arguments against the input schema.",
            Self::InvalidUrl => {
                "Pass an absolute public http(s) URL. Private and local addresses are refused unless WEBSOLVE_ALLOW_PRIVATE_URLS=true."
            }
            Self::NotConfigured => {
                "Set SEARXNG_URL to your SearXNG instance (e.g. http://localhost:8080) and restart the server."
            }
            Self::NotSupported => "Retry with raw=true to get the body unconverted.",
            Self::SearchFailed => {
                "The SearXNG instance returned an error. Check that it is reachable and has the JSON output format enabled."
            }
            Self::FetchFailed => "The page could not be fetched; try another URL from the results.",
            Self::Timeout => "The request timed out. Retry, or raise SEARXNG_TIMEOUT.",
            Self::UnexpectedError => "Unexpected internal error; check the server log (stderr).",
        }
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    // `request` is always present: null or object.
    if payload.get("request").is_none() {
        payload["request"] = serde_json::Value::Null;
    }
}

pub(crate) fn error_obj(
    code: ErrorCode,
    message: impl ToString,
    hint: impl ToString,
) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: String,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: hint.to_string(),
        retryable: code.retryable(),
    };
    match serde_json::to_value(e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "hint": hint.to_string(),
            "retryable": code.retryable()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_fields_are_always_present() {
        let mut v = serde_json::json!({ "ok": true });
        add_envelope_fields(&mut v, "metasearch_web", 12);
        assert_eq!(v["schema_version"], SCHEMA_VERSION);
        assert_eq!(v["kind"], "metasearch_web");
        assert_eq!(v["elapsed_ms"], 12);
        assert!(v["request"].is_null());

        let mut v = serde_json::json!({ "ok": true, "request": { "q": "x" } });
        add_envelope_fields(&mut v, "k", 0);
        assert_eq!(v["request"]["q"], "x");
    }

    #[test]
    fn collaborator_errors_map_to_codes() {
        let cases = [
            (Error::Timeout("t".into()), ErrorCode::Timeout),
            (Error::Search("s".into()), ErrorCode::SearchFailed),
            (Error::Fetch("f".into()), ErrorCode::FetchFailed),
            (Error::MalformedContent("m".into()), ErrorCode::FetchFailed),
            (Error::InvalidUrl("u".into()), ErrorCode::InvalidUrl),
            (Error::NotConfigured("n".into()), ErrorCode::NotConfigured),
            (Error::InvalidArgument("a".into()), ErrorCode::InvalidParams),
        ];
        for (e, want) in cases {
            assert_eq!(ErrorCode::for_error(&e, ErrorCode::FetchFailed), want, "{e}");
        }
    }

    #[test]
    fn error_obj_shape() {
        let v = error_obj(ErrorCode::Timeout, "slow", "retry");
        assert_eq!(v["code"], "timeout");
        assert_eq!(v["message"], "slow");
        assert_eq!(v["hint"], "retry");
        assert_eq!(v["retryable"], true);
        assert_eq!(error_obj(ErrorCode::InvalidParams, "", "")["retryable"], false);
    }
}
