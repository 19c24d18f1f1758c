//! Utility functions

use std::net::IpAddr;
use url::Url;

/// Scheme assumed when a URL has none
pub const DEFAULT_SCHEME: &str = "http";

/// Canonicalize a rendered URL into the absolute form that goes on the wire
///
/// Adds a missing scheme, expands the `:3000/path` localhost shorthand and
/// normalizes through the URL parser (percent-encoding, empty path → `/`,
/// empty query dropped). Input the parser rejects is returned with only the
/// scheme fix applied.
///
/// # Examples
/// ```
/// use restpulse::utils::prepare_url_for_sending;
/// assert_eq!(prepare_url_for_sending("example.com"), "http://example.com/");
/// assert_eq!(prepare_url_for_sending(":3000/api"), "http://localhost:3000/api");
/// ```
pub fn prepare_url_for_sending(raw_url: &str) -> String {
    let mut url = raw_url.trim().to_string();

    // Handle :// paste shortcut
    if let Some(rest) = url.strip_prefix("://") {
        url = rest.to_string();
    }

    if url.is_empty() {
        return url;
    }

    if !has_url_scheme(&url) {
        if let Some((port, rest)) = parse_localhost_shorthand(&url) {
            url = if port.is_empty() {
                format!("localhost{}", rest)
            } else {
                format!("localhost:{}{}", port, rest)
            };
        }
        url = format!("{}://{}", DEFAULT_SCHEME, url);
    }

    match Url::parse(&url) {
        Ok(mut parsed) => {
            if parsed.query() == Some("") {
                parsed.set_query(None);
            }
            if parsed.fragment() == Some("") {
                parsed.set_fragment(None);
            }
            parsed.to_string()
        }
        Err(_) => url,
    }
}

/// Check if a string carries a `scheme://` prefix
pub fn has_url_scheme(s: &str) -> bool {
    if let Some(pos) = s.find("://") {
        let scheme = &s[..pos];
        !scheme.is_empty()
            && scheme.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
            && scheme.chars().skip(1).all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    } else {
        false
    }
}

/// Parse localhost shorthand (:PORT/path or :/path)
/// Returns (port, rest) if it matches the pattern
fn parse_localhost_shorthand(s: &str) -> Option<(&str, &str)> {
    // Must start with : but not :: (IPv6)
    if !s.starts_with(':') || s.starts_with("::") {
        return None;
    }

    let after_colon = &s[1..];
    let (port, rest) = match after_colon.find('/') {
        Some(slash_pos) => (&after_colon[..slash_pos], &after_colon[slash_pos..]),
        None => (after_colon, ""),
    };

    if port.chars().all(|c| c.is_ascii_digit()) {
        Some((port, rest))
    } else {
        None
    }
}

/// Check if domain is localhost (Firefox-style secure context)
///
/// # Examples
/// ```
/// use restpulse::utils::is_localhost;
/// assert!(is_localhost("localhost"));
/// assert!(is_localhost("app.localhost"));
/// assert!(is_localhost("127.0.0.1"));
/// assert!(is_localhost("::1"));
/// assert!(!is_localhost("example.com"));
/// ```
pub fn is_localhost(domain: &str) -> bool {
    let domain = domain.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = domain.parse::<IpAddr>() {
        return ip.is_loopback();
    }

    domain == "localhost" || domain.ends_with(".localhost")
}
