//! Outbound URL guard: only public http(s) targets are fetched unless explicitly allowed.

use std::net::IpAddr;
use url::{Host, Url};
use websolve_core::{log_snippet, Error, Result};

fn ip_is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let seg0 = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link-local
                || (seg0 & 0xfe00) == 0xfc00
                || (seg0 & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| ip_is_private(IpAddr::V4(v4)))
        }
    }
}

/// Hostnames that look like private addresses even when they are not IP literals.
fn host_name_is_private(name: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    if name == "localhost" || name.ends_with(".localhost") {
        return true;
    }
    if ["10.", "127.", "192.168.", "169.254."]
        .iter()
        .any(|p| name.starts_with(p))
    {
        return true;
    }
    if let Some(rest) = name.strip_prefix("172.") {
        if let Some(second) = rest.split('.').next().and_then(|s| s.parse::<u8>().ok()) {
            return (16..=31).contains(&second);
        }
    }
    false
}

/// Reject non-http(s) schemes and private, loopback or link-local targets.
pub fn check_parsed(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "unsupported scheme {:?} (only http and https)",
            url.scheme()
        )));
    }
    let private = match url.host() {
        None => {
            return Err(Error::InvalidUrl("url has no host".to_string()));
        }
        Some(Host::Ipv4(v4)) => ip_is_private(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => ip_is_private(IpAddr::V6(v6)),
        Some(Host::Domain(d)) => host_name_is_private(d),
    };
    if private {
        return Err(Error::InvalidUrl(format!(
            "refusing private or local address: {}",
            log_snippet(url.as_str())
        )));
    }
    Ok(())
}

/// Parse and, unless `allow_private` is set, guard a caller-supplied URL.
pub fn check_url(raw: &str, allow_private: bool) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::InvalidUrl(format!("{e}: {}", log_snippet(raw))))?;
    if allow_private {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme {:?} (only http and https)",
                url.scheme()
            )));
        }
        return Ok(url);
    }
    check_parsed(&url)?;
    Ok(url)
}
